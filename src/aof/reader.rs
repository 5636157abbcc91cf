//! AOF Reader
//!
//! Replays persisted batches at startup.

use std::fs::OpenOptions;
use std::io::Cursor;

use tracing::{debug, error, info, warn};

use super::store::Aof;
use super::segment::ReadableSegment;
use crate::error::{KvError, ProtocolError, Result};
use crate::protocol::{decode, CommandBatch, WireValue};

/// Result of a replay pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Batches decoded and handed to the executor
    pub batches_replayed: u64,

    /// Of those, batches the executor answered with an error reply
    pub batches_rejected: u64,

    /// Segment files visited
    pub segments_scanned: u64,

    /// Write cursor once replay finished
    pub put_index: u64,

    /// Whether a torn frame at the end of the log was cut off
    pub was_truncated: bool,

    /// Whether replay gave up at a corrupt frame with later segments present
    pub stopped_on_corruption: bool,
}

impl Aof {
    /// Replay every persisted batch through `execute`, in log order.
    ///
    /// Holds the log lock for the whole pass, so no writer cycle can run
    /// concurrently. Replay stops at the first frame that fails to decode in
    /// the last segment; a torn tail after that point is truncated so the
    /// writer resumes on a clean boundary. A corrupt frame in an earlier
    /// segment ends replay as well and nothing after it is executed; the
    /// files are left as they are. Afterwards the write cursor sits right
    /// after the last replayed batch.
    pub fn replay<F>(&self, mut execute: F) -> Result<ReplayStats>
    where
        F: FnMut(CommandBatch) -> WireValue,
    {
        let mut state = self.state.write();
        let geometry = self.geometry();
        let piece = geometry.piece_size();
        let mut stats = ReplayStats::default();

        loop {
            let segment_id = geometry.segment_id(state.put_index);
            let path = self.segment_path(segment_id);
            if !path.exists() {
                break;
            }

            let segment = match ReadableSegment::open(&path, segment_id) {
                Ok(segment) => segment,
                Err(e) => {
                    warn!(segment_id, error = %e, "Unreadable AOF segment, replay stops here");
                    break;
                }
            };
            stats.segments_scanned += 1;

            let start = geometry.offset_in_segment(state.put_index);
            let base = state.put_index - start as u64;
            let bytes = segment.bytes();

            let mut cursor = Cursor::new(bytes);
            cursor.set_position(start as u64);

            let stop = loop {
                if cursor.position() as usize >= piece {
                    break None;
                }
                match decode(&mut cursor) {
                    Ok(batch) => {
                        state.put_index = base + cursor.position();
                        if batch.is_empty() {
                            continue;
                        }
                        if execute(batch).is_error() {
                            stats.batches_rejected += 1;
                        }
                        stats.batches_replayed += 1;
                    }
                    Err(e) => break Some(e),
                }
            };

            let valid_end = geometry.offset_in_segment(state.put_index);
            let filled = state.put_index == base + piece as u64;
            let next_exists = self.segment_path(segment_id + 1).exists();

            debug!(segment_id, valid_end, filled, "AOF segment replayed");

            if let Some(ProtocolError::Malformed(reason)) = &stop {
                if next_exists {
                    error!(
                        segment_id,
                        offset = valid_end,
                        %reason,
                        "Corrupt AOF frame before the last segment, replay stops here"
                    );
                    stats.stopped_on_corruption = true;
                    break;
                }
            } else if filled || next_exists {
                // Zero padding left behind by a rollover
                state.put_index = base + piece as u64;
                continue;
            }

            let torn = bytes[valid_end..].iter().any(|&b| b != 0);
            drop(segment);

            if torn {
                OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .and_then(|file| file.set_len(valid_end as u64))
                    .map_err(|source| KvError::SegmentIo { segment_id, source })?;
                warn!(segment_id, offset = valid_end, "Truncated torn AOF tail");
                stats.was_truncated = true;
            }
            break;
        }

        stats.put_index = state.put_index;
        info!(
            batches = stats.batches_replayed,
            rejected = stats.batches_rejected,
            segments = stats.segments_scanned,
            put_index = stats.put_index,
            truncated = stats.was_truncated,
            corrupt = stats.stopped_on_corruption,
            "AOF replay finished"
        );
        Ok(stats)
    }
}
