//! Append-Only File (AOF) Module
//!
//! Durably records every mutating command and replays them on startup.
//!
//! ## Responsibilities
//! - Drain queued command batches into memory-mapped segment files
//! - Keep a single monotonic write cursor across all segments
//! - Replay segments in order through an injected executor
//! - Release every mapping deterministically (flush, then unmap)
//!
//! ## File Layout
//! ```text
//! {base}_0.aof   bytes [0, 64 MiB)          of the logical log
//! {base}_1.aof   bytes [64 MiB, 128 MiB)
//! ...
//!
//! each file: frame | frame | frame | ... | zero padding
//! ```
//!
//! Frames are wire-protocol encoded batches with no extra header or checksum:
//! the framing itself marks the end of valid data.

mod store;
mod persister;
mod reader;
mod segment;
mod writer;

pub use store::Aof;
pub use persister::{Persister, DEFAULT_SHUTDOWN_TIMEOUT, MIN_PERSIST_INTERVAL};
pub use reader::ReplayStats;
pub use segment::{
    segment_path, ReadableSegment, SegmentGeometry, WritableSegment, DEFAULT_SEGMENT_SHIFT,
    MAX_SEGMENT_SHIFT, MIN_SEGMENT_SHIFT, SEGMENT_SUFFIX,
};
