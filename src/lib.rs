//! # ringkv
//!
//! A Redis-compatible in-memory key-value server with:
//! - A wire codec for the five protocol value types
//! - A bounded two-lock ring queue between clients and the persister
//! - A segmented, memory-mapped append-only log with startup replay
//! - Thread-per-connection TCP serving
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (one thread per connection)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ decode
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                  │
//! │        (commands run one at a time on the keyspace)          │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ execute                          │ offer (writes)
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌──────────────────┐
//!   │    Keyspace     │               │ RingBlockingQueue│
//!   └─────────────────┘               └────────┬─────────┘
//!                                              │ drain (persister thread)
//!                                              ▼
//!                                     ┌──────────────────┐
//!                                     │   AOF segments   │
//!                                     │ {base}_{id}.aof  │
//!                                     └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod queue;
pub mod aof;
pub mod keyspace;
pub mod command;
pub mod engine;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ringkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
