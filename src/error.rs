//! Error types for ringkv
//!
//! Provides a unified error type for all operations, plus the narrower
//! error enums used on the hot paths (codec and queue).

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for ringkv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // AOF Errors
    // -------------------------------------------------------------------------
    #[error("AOF segment {segment_id} I/O failed: {source}")]
    SegmentIo {
        segment_id: u64,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Protocol / Queue Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Wire codec failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not enough bytes buffered yet; retry once more arrive.
    #[error("incomplete frame")]
    Incomplete,

    /// Terminator or length mismatch; the stream is unusable past this point.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Ring buffer queue failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue full")]
    Full,

    #[error("queue empty")]
    Empty,

    #[error("illegal capacity: subarea size {subarea} > capacity {capacity}")]
    InvalidCapacity { subarea: usize, capacity: usize },
}

/// Command execution failures.
///
/// The display text is sent verbatim to the client as an error reply, so each
/// message carries its own `ERR` / `WRONGTYPE` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    Unknown(String),

    #[error("ERR wrong number of arguments for '{0}' command")]
    Arity(&'static str),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(&'static str),

    #[error("ERR invalid cursor")]
    InvalidCursor,

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR {0}")]
    Other(String),
}
