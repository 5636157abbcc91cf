//! AOF test suite

mod persister_tests;
mod writer_tests;

use std::path::PathBuf;

use ringkv::aof::Aof;
use ringkv::protocol::{encode_to_vec, CommandBatch, WireValue};
use ringkv::Config;
use tempfile::TempDir;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Segment shift used by most tests: 4 KiB pieces, 512-byte growth steps
pub const SMALL_SHIFT: u32 = 12;

pub fn setup_temp_config(shift: u32) -> (TempDir, Config) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .aof_path(temp_dir.path().join("appendonly"))
        .segment_shift(shift)
        .queue_capacity(1024)
        .build();
    (temp_dir, config)
}

pub fn open_aof(config: &Config) -> Aof {
    Aof::open(config).unwrap()
}

pub fn segment_file(config: &Config, id: u64) -> PathBuf {
    ringkv::aof::segment_path(&config.aof_path, id)
}

pub fn set_batch(key: &str, value: &str) -> CommandBatch {
    vec![
        WireValue::bulk("SET"),
        WireValue::bulk(key.as_bytes().to_vec()),
        WireValue::bulk(value.as_bytes().to_vec()),
    ]
}

pub fn frame_len(batch: &CommandBatch) -> u64 {
    encode_to_vec(batch).len() as u64
}

/// Replay into a list, answering every batch with `+OK`
pub fn replay_all(aof: &Aof) -> (Vec<CommandBatch>, ringkv::aof::ReplayStats) {
    let mut seen = Vec::new();
    let stats = aof
        .replay(|batch| {
            seen.push(batch);
            WireValue::ok()
        })
        .unwrap();
    (seen, stats)
}
