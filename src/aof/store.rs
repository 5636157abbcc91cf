//! AOF owner
//!
//! Holds the batch queue, the write cursor and the segment geometry. The
//! cursor lives behind a reader/writer lock: a writer cycle and replay each
//! take it exclusively, so they never overlap.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::segment::{segment_path, SegmentGeometry};
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::protocol::CommandBatch;
use crate::queue::RingBlockingQueue;

/// Initial capacity of the encode scratch buffer
const SCRATCH_CAPACITY: usize = 8888;

/// State owned by whichever of {writer cycle, replay} holds the lock
pub(super) struct LogState {
    /// Global byte offset of the next write (`aof_put_index`)
    pub(super) put_index: u64,

    /// Encoded form of the batch currently being written
    pub(super) scratch: BytesMut,
}

/// The segmented append-only log
pub struct Aof {
    base_path: PathBuf,
    geometry: SegmentGeometry,
    queue: Arc<RingBlockingQueue<CommandBatch>>,
    pub(super) state: RwLock<LogState>,
}

impl Aof {
    /// Open the log described by `config`.
    ///
    /// Creates the parent directory of the base path; failing to do so is
    /// fatal. Nothing is read yet: call [`Aof::replay`] before accepting
    /// traffic.
    pub fn open(config: &Config) -> Result<Self> {
        let geometry = SegmentGeometry::new(config.segment_shift)?;
        // A row never needs to be wider than the whole queue
        let subarea = config.queue_subarea.min(config.queue_capacity);
        let queue = RingBlockingQueue::with_subarea(subarea, config.queue_capacity)
            .map_err(|e| KvError::Config(e.to_string()))?;

        Self::create_parent_dir(&config.aof_path)?;

        info!(
            base = %config.aof_path.display(),
            piece_size = geometry.piece_size(),
            queue_capacity = queue.capacity(),
            "AOF opened"
        );

        Ok(Self {
            base_path: config.aof_path.clone(),
            geometry,
            queue: Arc::new(queue),
            state: RwLock::new(LogState {
                put_index: 0,
                scratch: BytesMut::with_capacity(SCRATCH_CAPACITY),
            }),
        })
    }

    fn create_parent_dir(base: &Path) -> Result<()> {
        match base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Queue a batch for persistence without blocking.
    ///
    /// Returns `false` (and logs) when the queue is full; durability is
    /// best-effort, the caller has already executed the command.
    pub fn append(&self, batch: CommandBatch) -> bool {
        let accepted = self.queue.offer(batch);
        if !accepted {
            warn!(capacity = self.queue.capacity(), "AOF queue full, dropping batch");
        }
        accepted
    }

    /// The queue feeding the writer
    pub fn queue(&self) -> &Arc<RingBlockingQueue<CommandBatch>> {
        &self.queue
    }

    /// Current write cursor. Blocks while a cycle or replay is running.
    pub fn put_index(&self) -> u64 {
        self.state.read().put_index
    }

    pub fn geometry(&self) -> SegmentGeometry {
        self.geometry
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of segment `segment_id`
    pub fn segment_path(&self, segment_id: u64) -> PathBuf {
        segment_path(&self.base_path, segment_id)
    }
}
