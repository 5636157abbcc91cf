//! AOF segments
//!
//! Geometry of the segmented log plus owned, memory-mapped segment handles.
//! A mapping is released when its handle is dropped; writable handles flush
//! first, on every exit path.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut};
use tracing::{debug, error};

use crate::error::{KvError, Result};

/// File suffix of every segment
pub const SEGMENT_SUFFIX: &str = ".aof";

/// Default segment shift: 1 << 26 = 64 MiB pieces
pub const DEFAULT_SEGMENT_SHIFT: u32 = 26;

/// Smallest shift accepted (4 KiB pieces, used by tests)
pub const MIN_SEGMENT_SHIFT: u32 = 12;

/// Largest shift accepted (1 GiB pieces)
pub const MAX_SEGMENT_SHIFT: u32 = 30;

/// Build the path of a segment: `{base}_{segment_id}.aof`
pub fn segment_path(base: &Path, segment_id: u64) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!("_{}{}", segment_id, SEGMENT_SUFFIX));
    PathBuf::from(name)
}

/// Address arithmetic of the segmented log.
///
/// A global offset splits into `segment_id = offset >> shift` and an
/// in-segment offset `offset & (piece - 1)`. File lengths always grow in
/// steps of an eighth of a piece, and never past a whole piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentGeometry {
    shift: u32,
}

impl SegmentGeometry {
    pub fn new(shift: u32) -> Result<Self> {
        if !(MIN_SEGMENT_SHIFT..=MAX_SEGMENT_SHIFT).contains(&shift) {
            return Err(KvError::Config(format!(
                "segment shift {} outside {}..={}",
                shift, MIN_SEGMENT_SHIFT, MAX_SEGMENT_SHIFT
            )));
        }
        Ok(Self { shift })
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Maximum bytes in one segment
    pub fn piece_size(&self) -> usize {
        1 << self.shift
    }

    /// Growth increment (1/8 piece)
    pub fn step(&self) -> usize {
        self.piece_size() >> 3
    }

    /// Minimum headroom kept past the write position when a segment is opened
    pub fn headroom(&self) -> usize {
        self.piece_size() >> 2
    }

    pub fn segment_id(&self, global: u64) -> u64 {
        global >> self.shift
    }

    pub fn offset_in_segment(&self, global: u64) -> usize {
        (global & (self.piece_size() as u64 - 1)) as usize
    }

    /// First global offset of the segment after the one holding `global`
    pub fn next_boundary(&self, global: u64) -> u64 {
        (self.segment_id(global) + 1) << self.shift
    }

    /// Round up to the next multiple of the growth step, capped at one piece
    pub fn grown_len(&self, needed: usize) -> usize {
        let step = self.step();
        needed.div_ceil(step).saturating_mul(step).min(self.piece_size())
    }

    /// File length to map when opening a segment whose file is currently
    /// `current` bytes long and whose write position is `put`.
    pub fn open_len(&self, current: u64, put: usize) -> u64 {
        let current = current as usize;
        if current >= put + self.headroom() || current >= self.piece_size() {
            return current as u64;
        }
        current.max(self.grown_len(put + self.headroom())) as u64
    }
}

// =============================================================================
// Writable Segment
// =============================================================================

/// A segment mapped read-write for appending.
pub struct WritableSegment {
    id: u64,
    file: File,
    map: MmapMut,
}

impl WritableSegment {
    /// Open (creating if needed) a segment, extend it so there is headroom
    /// past `put`, and map it.
    pub fn open(path: &Path, id: u64, put: usize, geometry: &SegmentGeometry) -> Result<Self> {
        let io = |source| KvError::SegmentIo { segment_id: id, source };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io)?;

        let current = file.metadata().map_err(io)?.len();
        let len = geometry.open_len(current, put);
        if len != current {
            file.set_len(len).map_err(io)?;
            debug!(segment_id = id, from = current, to = len, "Extended AOF segment");
        }

        // The file is only written through this mapping, by the holder of the log lock.
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(io)?;

        Ok(Self { id, file, map })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mapped length in bytes
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Extend the file to `new_len` and remap it
    pub fn grow(&mut self, new_len: usize) -> Result<()> {
        let io = |source| KvError::SegmentIo { segment_id: self.id, source };

        self.map.flush().map_err(io)?;
        self.file.set_len(new_len as u64).map_err(io)?;
        self.map = unsafe { MmapMut::map_mut(&self.file) }.map_err(io)?;

        debug!(segment_id = self.id, len = new_len, "Remapped AOF segment");
        Ok(())
    }

    /// Copy `bytes` into the mapping at `offset`. The caller guarantees
    /// `offset + bytes.len() <= self.len()`.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        self.map[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Force the mapped pages to disk
    pub fn flush(&self) -> Result<()> {
        self.map
            .flush()
            .map_err(|source| KvError::SegmentIo { segment_id: self.id, source })
    }
}

impl Drop for WritableSegment {
    fn drop(&mut self) {
        // The mapping itself is unmapped when `map` drops right after this.
        if let Err(e) = self.map.flush() {
            error!(segment_id = self.id, error = %e, "Failed to flush AOF segment on release");
        }
    }
}

// =============================================================================
// Readable Segment
// =============================================================================

/// A segment mapped read-only for replay.
pub struct ReadableSegment {
    id: u64,
    map: Option<Mmap>,
}

impl ReadableSegment {
    pub fn open(path: &Path, id: u64) -> Result<Self> {
        let io = |source| KvError::SegmentIo { segment_id: id, source };

        let file = File::open(path).map_err(io)?;
        let len = file.metadata().map_err(io)?.len();

        // Empty files cannot be mapped on every platform
        let map = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file) }.map_err(io)?)
        };

        Ok(Self { id, map })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}
