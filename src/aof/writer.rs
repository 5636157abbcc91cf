//! AOF Writer
//!
//! Drains the batch queue into memory-mapped segments.

use tracing::{debug, error, trace};

use super::store::{Aof, LogState};
use super::segment::WritableSegment;
use crate::error::Result;
use crate::protocol::encode;

impl Aof {
    /// Run one persistence cycle.
    ///
    /// Returns `Ok(None)` when another cycle or replay holds the log; the
    /// cycle is skipped, not queued. Otherwise returns how many batches were
    /// written. On error, batches not yet written stay queued.
    pub fn persist_cycle(&self) -> Result<Option<usize>> {
        let Some(mut state) = self.state.try_write() else {
            trace!("AOF cycle skipped, log busy");
            return Ok(None);
        };
        self.drain_into_segments(&mut state).map(Some)
    }

    /// Like [`Aof::persist_cycle`] but waits for the log lock. Used for the
    /// final drain at shutdown.
    pub fn persist_blocking(&self) -> Result<usize> {
        let mut state = self.state.write();
        self.drain_into_segments(&mut state)
    }

    fn drain_into_segments(&self, state: &mut LogState) -> Result<usize> {
        let geometry = self.geometry();
        let piece = geometry.piece_size();
        let mut written = 0;

        loop {
            if self.queue().is_empty() {
                return Ok(written);
            }

            let segment_id = geometry.segment_id(state.put_index);
            let mut put = geometry.offset_in_segment(state.put_index);
            let base = state.put_index - put as u64;

            let mut segment =
                WritableSegment::open(&self.segment_path(segment_id), segment_id, put, &geometry)?;

            let rolled = loop {
                state.scratch.clear();
                let scratch = &mut state.scratch;
                if self.queue().peek_with(|batch| encode(batch, scratch)).is_none() {
                    break false;
                }

                let frame_len = state.scratch.len();
                if frame_len > piece {
                    error!(frame_len, piece, "Batch larger than a whole segment, dropping it");
                    self.queue().poll();
                    continue;
                }

                if put + frame_len > segment.len() {
                    if put + frame_len > piece {
                        // Roll over; the batch stays queued for the next segment
                        state.put_index = base + piece as u64;
                        break true;
                    }
                    segment.grow(geometry.grown_len(put + frame_len))?;
                }

                segment.write_at(put, &state.scratch);
                put += frame_len;
                state.put_index = base + put as u64;
                self.queue().poll();
                written += 1;
            };

            segment.flush()?;
            debug!(
                segment_id,
                put_index = state.put_index,
                written,
                rolled,
                "AOF cycle wrote segment"
            );
            drop(segment);

            if !rolled {
                state.scratch.clear();
                return Ok(written);
            }
        }
    }
}
