//! Ring blocking queue
//!
//! Bounded FIFO with separate producer and consumer locks.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::QueueError;

/// Smallest capacity (and subarea) the queue will use
pub const MIN_CAPACITY: usize = 16;

/// Largest total capacity (2^29)
pub const MAX_CAPACITY: usize = 1 << 29;

/// Largest row width (2^12)
pub const MAX_SUBAREA: usize = 1 << 12;

/// Bounded, thread-safe FIFO backed by a rows × columns ring.
///
/// ## Concurrency:
/// - `put_lock` guards the offer path and `write_index`; waits on `not_full`
/// - `take_lock` guards the poll path and `read_index`; waits on `not_empty`
/// - `count` is shared by both sides
/// - whole-queue scans take both locks, producer then consumer
///
/// ## Indices:
/// `read_index` and `write_index` only grow. An element is present at
/// position `i` for `read_index < i <= write_index`. Once the read position
/// wraps back to slot (0, 0) with `read_index > capacity`, both indices are
/// shifted down by `capacity` so they stay bounded; the slot mapping is
/// unchanged because the capacity is a multiple of the ring size.
pub struct RingBlockingQueue<T> {
    /// `rows × subarea` slots
    slots: Box<[Box<[Mutex<Option<T>>]>]>,

    capacity: usize,
    col_bits: u32,
    row_mask: i64,
    col_mask: i64,

    read_index: AtomicI64,
    write_index: AtomicI64,
    count: AtomicUsize,

    take_lock: Mutex<()>,
    not_empty: Condvar,
    put_lock: Mutex<()>,
    not_full: Condvar,
}

/// Result of removing the head element while holding `take_lock`
struct Dequeued<T> {
    item: T,
    /// Occupancy before the removal
    prev_count: usize,
    /// The read position crossed slot (0, 0) past one full lap
    rebase: bool,
}

impl<T> RingBlockingQueue<T> {
    /// Create a queue holding at least `capacity` items.
    ///
    /// The capacity is rounded up to a power of two, no smaller than 16.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        Self::build(capacity.min(MAX_SUBAREA), capacity)
    }

    /// Create a queue with an explicit row width.
    ///
    /// Fails when `subarea` exceeds `capacity` (after both are raised to the
    /// minimum).
    pub fn with_subarea(subarea: usize, capacity: usize) -> Result<Self, QueueError> {
        let capacity = capacity.max(MIN_CAPACITY);
        let subarea = subarea.max(MIN_CAPACITY);
        if subarea > capacity {
            return Err(QueueError::InvalidCapacity { subarea, capacity });
        }
        Ok(Self::build(subarea, capacity))
    }

    fn build(subarea: usize, capacity: usize) -> Self {
        let cols = subarea.next_power_of_two().min(MAX_SUBAREA);
        let requested = capacity.next_power_of_two().min(MAX_CAPACITY);
        let rows = (requested / cols).max(1).next_power_of_two();
        let capacity = rows * cols;

        let slots = (0..rows)
            .map(|_| (0..cols).map(|_| Mutex::new(None)).collect::<Vec<_>>().into_boxed_slice())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            capacity,
            col_bits: cols.trailing_zeros(),
            row_mask: rows as i64 - 1,
            col_mask: cols as i64 - 1,
            read_index: AtomicI64::new(-1),
            write_index: AtomicI64::new(-1),
            count: AtomicUsize::new(0),
            take_lock: Mutex::new(()),
            not_empty: Condvar::new(),
            put_lock: Mutex::new(()),
            not_full: Condvar::new(),
        }
    }

    // =========================================================================
    // Producer side
    // =========================================================================

    /// Insert without blocking. Returns `false` when the queue is full.
    pub fn offer(&self, item: T) -> bool {
        let guard = self.put_lock.lock();
        let prev = match self.enqueue(item) {
            Ok(prev) => prev,
            Err(_) => return false,
        };
        if prev + 1 < self.capacity {
            self.not_full.notify_one();
        }
        drop(guard);

        if prev == 0 {
            self.signal_not_empty();
        }
        true
    }

    /// Insert, blocking until space is available.
    pub fn put(&self, item: T) {
        let mut guard = self.put_lock.lock();
        let mut item = item;
        let prev = loop {
            if self.count.load(Ordering::Acquire) >= self.capacity {
                self.not_full.wait(&mut guard);
                continue;
            }
            match self.enqueue(item) {
                Ok(prev) => break prev,
                Err(back) => {
                    item = back;
                    self.not_full.wait(&mut guard);
                }
            }
        };
        if prev + 1 < self.capacity {
            self.not_full.notify_one();
        }
        drop(guard);

        if prev == 0 {
            self.signal_not_empty();
        }
    }

    /// Insert, waiting up to `timeout` for space. Returns `false` on timeout.
    pub fn offer_timeout(&self, item: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.put_lock.lock();
        let mut item = item;
        let prev = loop {
            if self.count.load(Ordering::Acquire) < self.capacity {
                match self.enqueue(item) {
                    Ok(prev) => break prev,
                    Err(back) => item = back,
                }
            }
            if self.not_full.wait_until(&mut guard, deadline).timed_out()
                && self.count.load(Ordering::Acquire) >= self.capacity
            {
                return false;
            }
        };
        if prev + 1 < self.capacity {
            self.not_full.notify_one();
        }
        drop(guard);

        if prev == 0 {
            self.signal_not_empty();
        }
        true
    }

    /// Insert or fail with `QueueError::Full`
    pub fn add(&self, item: T) -> Result<(), QueueError> {
        if self.offer(item) {
            Ok(())
        } else {
            Err(QueueError::Full)
        }
    }

    /// Must be called with `put_lock` held. Returns the previous occupancy,
    /// or hands the item back when there is no room.
    fn enqueue(&self, item: T) -> Result<usize, T> {
        if self.count.load(Ordering::Acquire) >= self.capacity {
            return Err(item);
        }

        let next = self.write_index.load(Ordering::Relaxed) + 1;
        if next > self.read_index.load(Ordering::Acquire) + self.capacity as i64 {
            return Err(item);
        }

        *self.slot(next).lock() = Some(item);
        self.write_index.store(next, Ordering::Release);
        Ok(self.count.fetch_add(1, Ordering::AcqRel))
    }

    // =========================================================================
    // Consumer side
    // =========================================================================

    /// Remove the head without blocking
    pub fn poll(&self) -> Option<T> {
        let guard = self.take_lock.lock();
        let taken = self.dequeue();
        if taken.as_ref().is_some_and(|d| d.prev_count > 1) {
            self.not_empty.notify_one();
        }
        drop(guard);

        taken.map(|d| self.after_take(d))
    }

    /// Remove the head, blocking until one is available
    pub fn take(&self) -> T {
        let mut guard = self.take_lock.lock();
        let taken = loop {
            if let Some(d) = self.dequeue() {
                break d;
            }
            self.not_empty.wait(&mut guard);
        };
        if taken.prev_count > 1 {
            self.not_empty.notify_one();
        }
        drop(guard);

        self.after_take(taken)
    }

    /// Remove the head, waiting up to `timeout` for one to arrive
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.take_lock.lock();
        let taken = loop {
            if let Some(d) = self.dequeue() {
                break d;
            }
            if self.not_empty.wait_until(&mut guard, deadline).timed_out() {
                match self.dequeue() {
                    Some(d) => break d,
                    None => return None,
                }
            }
        };
        if taken.prev_count > 1 {
            self.not_empty.notify_one();
        }
        drop(guard);

        Some(self.after_take(taken))
    }

    /// Remove the head or fail with `QueueError::Empty`
    pub fn remove(&self) -> Result<T, QueueError> {
        self.poll().ok_or(QueueError::Empty)
    }

    /// Inspect the head without removing it
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let _guard = self.take_lock.lock();
        let read = self.read_index.load(Ordering::Relaxed);
        if self.write_index.load(Ordering::Acquire) <= read {
            return None;
        }
        let slot = self.slot(read + 1).lock();
        slot.as_ref().map(f)
    }

    /// Move up to `max` items into `sink`. Returns how many were moved.
    pub fn drain_to<E: Extend<T>>(&self, sink: &mut E, max: usize) -> usize {
        if max == 0 {
            return 0;
        }

        let guard = self.take_lock.lock();
        let mut moved = 0;
        let mut was_full = false;
        let mut rebase = false;
        while moved < max {
            let Some(d) = self.dequeue() else { break };
            was_full |= d.prev_count == self.capacity;
            rebase |= d.rebase;
            sink.extend(std::iter::once(d.item));
            moved += 1;
        }
        if moved > 0 && self.count.load(Ordering::Acquire) > 0 {
            self.not_empty.notify_one();
        }
        drop(guard);

        if rebase {
            self.rebase();
        }
        if was_full {
            self.signal_not_full();
        }
        moved
    }

    /// Must be called with `take_lock` held
    fn dequeue(&self) -> Option<Dequeued<T>> {
        let read = self.read_index.load(Ordering::Relaxed);
        if self.write_index.load(Ordering::Acquire) <= read {
            return None;
        }

        let next = read + 1;
        let item = self.slot(next).lock().take()?;
        self.read_index.store(next, Ordering::Release);
        let prev_count = self.count.fetch_sub(1, Ordering::AcqRel);

        Some(Dequeued {
            item,
            prev_count,
            rebase: self.is_origin(next) && next > self.capacity as i64,
        })
    }

    /// Bookkeeping once `take_lock` has been released
    fn after_take(&self, d: Dequeued<T>) -> T {
        if d.rebase {
            self.rebase();
        }
        if d.prev_count == self.capacity {
            self.signal_not_full();
        }
        d.item
    }

    // =========================================================================
    // Whole-queue operations
    // =========================================================================

    /// Current occupancy
    pub fn size(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Total slots (the rounded-up capacity)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.size()
    }

    /// Drop every queued item and wake blocked producers
    pub fn clear(&self) {
        let (_put, _take) = self.fully_lock();
        let read = self.read_index.load(Ordering::Relaxed);
        let write = self.write_index.load(Ordering::Relaxed);
        for index in read + 1..=write {
            self.slot(index).lock().take();
        }
        self.read_index.store(write, Ordering::Release);
        self.count.store(0, Ordering::Release);
        self.not_full.notify_all();
    }

    /// Remove the first element equal to `item`, preserving the order of the rest
    pub fn remove_item(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let (_put, _take) = self.fully_lock();
        let read = self.read_index.load(Ordering::Relaxed);
        let write = self.write_index.load(Ordering::Relaxed);

        let found = (read + 1..=write).find(|&i| self.slot(i).lock().as_ref() == Some(item));
        let Some(found) = found else {
            return false;
        };

        self.slot(found).lock().take();
        for index in found..write {
            let next = self.slot(index + 1).lock().take();
            *self.slot(index).lock() = next;
        }
        self.write_index.store(write - 1, Ordering::Release);
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        if prev == self.capacity {
            self.not_full.notify_one();
        }
        true
    }

    fn fully_lock(&self) -> (MutexGuard<'_, ()>, MutexGuard<'_, ()>) {
        let put = self.put_lock.lock();
        let take = self.take_lock.lock();
        (put, take)
    }

    /// Shift both indices down by one lap once the reader is past it
    fn rebase(&self) {
        let (_put, _take) = self.fully_lock();
        let read = self.read_index.load(Ordering::Relaxed);
        if read > self.capacity as i64 {
            let lap = self.capacity as i64;
            self.read_index.store(read - lap, Ordering::Release);
            self.write_index.fetch_sub(lap, Ordering::AcqRel);
        }
    }

    fn signal_not_empty(&self) {
        let _guard = self.take_lock.lock();
        self.not_empty.notify_one();
    }

    fn signal_not_full(&self) {
        let _guard = self.put_lock.lock();
        self.not_full.notify_one();
    }

    fn slot(&self, index: i64) -> &Mutex<Option<T>> {
        let row = (index >> self.col_bits) & self.row_mask;
        let col = index & self.col_mask;
        &self.slots[row as usize][col as usize]
    }

    fn is_origin(&self, index: i64) -> bool {
        (index >> self.col_bits) & self.row_mask == 0 && index & self.col_mask == 0
    }
}

impl<T: Clone> RingBlockingQueue<T> {
    /// Clone of the head, without removing it
    pub fn peek(&self) -> Option<T> {
        self.peek_with(T::clone)
    }

    /// Clone of the head or `QueueError::Empty`
    pub fn element(&self) -> Result<T, QueueError> {
        self.peek().ok_or(QueueError::Empty)
    }

    /// Snapshot of the queue contents, head first
    pub fn to_vec(&self) -> Vec<T> {
        let (_put, _take) = self.fully_lock();
        let read = self.read_index.load(Ordering::Relaxed);
        let write = self.write_index.load(Ordering::Relaxed);
        (read + 1..=write)
            .filter_map(|i| self.slot(i).lock().clone())
            .collect()
    }
}

impl<T: PartialEq> RingBlockingQueue<T> {
    pub fn contains(&self, item: &T) -> bool {
        let (_put, _take) = self.fully_lock();
        let read = self.read_index.load(Ordering::Relaxed);
        let write = self.write_index.load(Ordering::Relaxed);
        (read + 1..=write).any(|i| self.slot(i).lock().as_ref() == Some(item))
    }
}

impl<T> fmt::Debug for RingBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBlockingQueue")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish()
    }
}
