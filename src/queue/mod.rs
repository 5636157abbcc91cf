//! Queue Module
//!
//! Bounded blocking FIFO that decouples request ingestion from disk writes.
//!
//! ## Responsibilities
//! - Carry command batches from connection threads to the persistence thread
//! - Non-blocking (`offer`/`poll`/`peek`) and blocking (`put`/`take`, timed
//!   variants) access
//! - Strict FIFO order, no reordering or priority
//!
//! ## Layout
//! ```text
//!            col 0   col 1   ...   col N-1
//!   row 0  [ slot ][ slot ]  ...  [ slot ]
//!   row 1  [ slot ][ slot ]  ...  [ slot ]
//!    ...
//!   index -> (row, col) = ((i >> log2 N) & row_mask, i & col_mask)
//! ```

mod ring;

pub use ring::{RingBlockingQueue, MAX_CAPACITY, MAX_SUBAREA, MIN_CAPACITY};
