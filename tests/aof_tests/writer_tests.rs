//! Tests for the AOF writer cycle
//!
//! These tests verify:
//! - Exact on-disk bytes of a persisted batch
//! - File growth in whole steps
//! - Rollover into the next segment, including an exact boundary fill
//! - Oversized batches are dropped instead of stalling the queue

use std::fs;

use ringkv::protocol::WireValue;

use super::{frame_len, open_aof, segment_file, set_batch, setup_temp_config, SMALL_SHIFT};

// =============================================================================
// Basic Persistence Tests
// =============================================================================

#[test]
fn test_set_foo_bar_on_disk() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);

    assert!(aof.append(set_batch("foo", "bar")));
    assert_eq!(aof.persist_blocking().unwrap(), 1);

    let expected = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
    let bytes = fs::read(segment_file(&config, 0)).unwrap();
    assert_eq!(&bytes[..expected.len()], expected);
    assert!(bytes[expected.len()..].iter().all(|&b| b == 0));
    assert_eq!(aof.put_index(), expected.len() as u64);
}

#[test]
fn test_file_length_is_whole_steps() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);
    let step = aof.geometry().step() as u64;

    aof.append(set_batch("k", "v"));
    aof.persist_blocking().unwrap();

    let len = fs::metadata(segment_file(&config, 0)).unwrap().len();
    assert_eq!(len % step, 0);
    assert!(len >= aof.geometry().headroom() as u64);
}

#[test]
fn test_cycle_on_empty_queue_writes_nothing() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);

    assert_eq!(aof.persist_cycle().unwrap(), Some(0));
    assert_eq!(aof.put_index(), 0);
    assert!(!segment_file(&config, 0).exists());
}

#[test]
fn test_batches_written_in_queue_order() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);

    let mut expected_len = 0;
    for i in 0..20 {
        let batch = set_batch(&format!("k{}", i), "v");
        expected_len += frame_len(&batch);
        aof.append(batch);
    }
    assert_eq!(aof.persist_cycle().unwrap(), Some(20));
    assert_eq!(aof.put_index(), expected_len);
    assert!(aof.queue().is_empty());
}

#[test]
fn test_cursor_accumulates_across_cycles() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);

    let first = set_batch("a", "1");
    let second = set_batch("bb", "22");
    let expected = frame_len(&first) + frame_len(&second);

    aof.append(first);
    aof.persist_blocking().unwrap();
    aof.append(second);
    aof.persist_blocking().unwrap();

    assert_eq!(aof.put_index(), expected);
}

// =============================================================================
// Rollover Tests
// =============================================================================

#[test]
fn test_rollover_exactly_on_boundary() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);
    let piece = aof.geometry().piece_size() as u64;

    // 29 bytes of framing + 4067 bytes of value = one whole 4 KiB piece
    let filler = set_batch("k", &"x".repeat(4067));
    assert_eq!(frame_len(&filler), piece);
    let next = set_batch("after", "boundary");

    aof.append(filler);
    aof.append(next.clone());
    assert_eq!(aof.persist_blocking().unwrap(), 2);

    assert_eq!(aof.put_index(), piece + frame_len(&next));
    assert_eq!(fs::metadata(segment_file(&config, 0)).unwrap().len(), piece);

    let second = fs::read(segment_file(&config, 1)).unwrap();
    let encoded = ringkv::protocol::encode_to_vec(&next);
    assert_eq!(&second[..encoded.len()], &encoded[..]);
}

#[test]
fn test_batch_that_does_not_fit_moves_to_next_segment() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);
    let piece = aof.geometry().piece_size() as u64;

    let big = set_batch("big", &"y".repeat(3000));
    let also_big = set_batch("big2", &"z".repeat(3000));
    aof.append(big.clone());
    aof.append(also_big.clone());
    assert_eq!(aof.persist_blocking().unwrap(), 2);

    // The second batch starts at the boundary; the gap in segment 0 stays zero
    assert_eq!(aof.put_index(), piece + frame_len(&also_big));
    let first = fs::read(segment_file(&config, 0)).unwrap();
    assert!(first[frame_len(&big) as usize..].iter().all(|&b| b == 0));
}

#[test]
fn test_many_segments() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);

    for i in 0..200 {
        aof.append(set_batch(&format!("key:{:04}", i), &"v".repeat(64)));
    }
    assert_eq!(aof.persist_blocking().unwrap(), 200);

    let last = aof.geometry().segment_id(aof.put_index());
    assert!(last >= 4);
    for id in 0..=last {
        let len = fs::metadata(segment_file(&config, id)).unwrap().len();
        assert!(len <= aof.geometry().piece_size() as u64);
    }
}

#[test]
fn test_oversized_batch_is_dropped() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);

    aof.append(set_batch("huge", &"h".repeat(5000)));
    aof.append(set_batch("small", "ok"));

    assert_eq!(aof.persist_blocking().unwrap(), 1);
    assert!(aof.queue().is_empty());
    assert_eq!(aof.put_index(), frame_len(&set_batch("small", "ok")));
}

#[test]
fn test_full_queue_drops_batch() {
    let (_temp, config) = setup_temp_config(SMALL_SHIFT);
    let aof = open_aof(&config);
    let capacity = aof.queue().capacity();

    for _ in 0..capacity {
        assert!(aof.append(vec![WireValue::bulk("PING")]));
    }
    assert!(!aof.append(vec![WireValue::bulk("PING")]));
}
