//! Tests for RingBlockingQueue
//!
//! These tests verify:
//! - Capacity rounding and the full/empty boundaries
//! - FIFO order, including across index rebasing
//! - Blocking put/take between threads
//! - Whole-queue operations (drain, contains, remove, clear)

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ringkv::error::QueueError;
use ringkv::queue::{RingBlockingQueue, MAX_SUBAREA};

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_capacity_rounds_up_to_power_of_two() {
    assert_eq!(RingBlockingQueue::<u8>::new(100).capacity(), 128);
    assert_eq!(RingBlockingQueue::<u8>::new(128).capacity(), 128);
    assert_eq!(RingBlockingQueue::<u8>::new(1).capacity(), 16);
    assert_eq!(RingBlockingQueue::<u8>::new(0).capacity(), 16);
}

#[test]
fn test_capacity_boundary_of_100() {
    let queue = RingBlockingQueue::new(100);

    for i in 0..128 {
        assert!(queue.offer(i), "offer {} should succeed", i);
    }
    assert!(!queue.offer(128));
    assert_eq!(queue.size(), 128);
    assert_eq!(queue.remaining_capacity(), 0);
    assert_eq!(queue.add(999), Err(QueueError::Full));

    assert_eq!(queue.poll(), Some(0));
    assert!(queue.offer(128));
    assert_eq!(queue.size(), 128);
}

#[test]
fn test_subarea_larger_than_capacity_is_rejected() {
    let err = RingBlockingQueue::<u8>::with_subarea(MAX_SUBAREA, 100).unwrap_err();
    assert!(matches!(err, QueueError::InvalidCapacity { .. }));
}

// =============================================================================
// FIFO Tests
// =============================================================================

#[test]
fn test_fifo_order() {
    let queue = RingBlockingQueue::new(16);
    for i in 0..10 {
        queue.put(i);
    }
    for i in 0..10 {
        assert_eq!(queue.take(), i);
    }
    assert!(queue.is_empty());
    assert_eq!(queue.poll(), None);
}

#[test]
fn test_fifo_across_many_laps() {
    let queue = RingBlockingQueue::with_subarea(16, 64).unwrap();
    let mut next_in = 0u64;
    let mut next_out = 0u64;

    // Uneven produce/consume so the head sits at every slot over time
    for round in 0..500 {
        for _ in 0..(round % 7 + 1) {
            if queue.offer(next_in) {
                next_in += 1;
            }
        }
        for _ in 0..(round % 5 + 1) {
            if let Some(v) = queue.poll() {
                assert_eq!(v, next_out);
                next_out += 1;
            }
        }
    }
    while let Some(v) = queue.poll() {
        assert_eq!(v, next_out);
        next_out += 1;
    }
    assert_eq!(next_in, next_out);
}

#[test]
fn test_peek_does_not_remove() {
    let queue = RingBlockingQueue::new(16);
    assert_eq!(queue.peek(), None);
    assert_eq!(queue.element(), Err(QueueError::Empty));

    queue.put("a".to_string());
    queue.put("b".to_string());
    assert_eq!(queue.peek(), Some("a".to_string()));
    assert_eq!(queue.peek_with(|s| s.len()), Some(1));
    assert_eq!(queue.size(), 2);
    assert_eq!(queue.remove(), Ok("a".to_string()));
    assert_eq!(queue.element(), Ok("b".to_string()));
}

// =============================================================================
// Blocking Tests
// =============================================================================

#[test]
fn test_take_blocks_until_put() {
    let queue = Arc::new(RingBlockingQueue::new(16));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.take())
    };

    thread::sleep(Duration::from_millis(50));
    queue.put(7u32);
    assert_eq!(consumer.join().unwrap(), 7);
}

#[test]
fn test_put_blocks_while_full() {
    let queue = Arc::new(RingBlockingQueue::new(16));
    for i in 0..16u32 {
        queue.put(i);
    }

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.put(16))
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!producer.is_finished());
    assert_eq!(queue.take(), 0);
    producer.join().unwrap();
    assert_eq!(queue.size(), 16);
}

#[test]
fn test_poll_timeout_expires() {
    let queue: RingBlockingQueue<u32> = RingBlockingQueue::new(16);
    let start = Instant::now();
    assert_eq!(queue.poll_timeout(Duration::from_millis(50)), None);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_poll_timeout_receives_late_put() {
    let queue = Arc::new(RingBlockingQueue::new(16));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.poll_timeout(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(50));
    queue.put(42u32);
    assert_eq!(consumer.join().unwrap(), Some(42));
    assert!(queue.is_empty());
}

#[test]
fn test_poll_and_drain_wake_remaining_takers() {
    let queue = Arc::new(RingBlockingQueue::new(16));
    let takers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.poll_timeout(Duration::from_secs(5)))
        })
        .collect();
    thread::sleep(Duration::from_millis(50));

    for i in 0..4u32 {
        assert!(queue.offer(i));
    }
    let polled = queue.poll();
    let mut sink = Vec::new();
    queue.drain_to(&mut sink, 1);

    let start = Instant::now();
    let taken: Vec<_> = takers.into_iter().map(|t| t.join().unwrap()).collect();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(taken.iter().all(Option::is_some));
    assert!(polled.is_some());
    assert_eq!(sink.len(), 1);
    assert!(queue.is_empty());
}

#[test]
fn test_offer_timeout_on_full_queue() {
    let queue = RingBlockingQueue::new(16);
    for i in 0..16u32 {
        queue.put(i);
    }
    assert!(!queue.offer_timeout(99, Duration::from_millis(30)));
    queue.poll();
    assert!(queue.offer_timeout(99, Duration::from_millis(30)));
}

#[test]
fn test_producers_and_consumer_threads() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 5_000;

    let queue = Arc::new(RingBlockingQueue::with_subarea(16, 64).unwrap());
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.put(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let mut last_seen = vec![None::<u64>; PRODUCERS as usize];
    for _ in 0..PRODUCERS * PER_PRODUCER {
        let v = queue.take();
        let p = (v / PER_PRODUCER) as usize;
        // Each producer's items arrive in the order it put them
        if let Some(prev) = last_seen[p] {
            assert!(v > prev);
        }
        last_seen[p] = Some(v);
    }

    for producer in producers {
        producer.join().unwrap();
    }
    assert!(queue.is_empty());
}

// =============================================================================
// Whole-Queue Operation Tests
// =============================================================================

#[test]
fn test_drain_to_respects_max() {
    let queue = RingBlockingQueue::new(32);
    for i in 0..10 {
        queue.put(i);
    }

    let mut sink = Vec::new();
    assert_eq!(queue.drain_to(&mut sink, 4), 4);
    assert_eq!(sink, vec![0, 1, 2, 3]);
    assert_eq!(queue.drain_to(&mut sink, usize::MAX), 6);
    assert_eq!(sink.len(), 10);
    assert!(queue.is_empty());
}

#[test]
fn test_contains_and_remove_item() {
    let queue = RingBlockingQueue::new(16);
    for i in 0..5 {
        queue.put(i);
    }
    assert!(queue.contains(&3));
    assert!(!queue.contains(&9));

    assert!(queue.remove_item(&2));
    assert!(!queue.remove_item(&2));
    assert_eq!(queue.to_vec(), vec![0, 1, 3, 4]);
    assert_eq!(queue.size(), 4);
}

#[test]
fn test_clear_empties_and_unblocks_producers() {
    let queue = Arc::new(RingBlockingQueue::new(16));
    for i in 0..16u32 {
        queue.put(i);
    }

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.put(100))
    };
    thread::sleep(Duration::from_millis(30));

    queue.clear();
    producer.join().unwrap();
    assert_eq!(queue.to_vec(), vec![100]);
}
