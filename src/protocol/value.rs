//! Wire value definitions
//!
//! The five reply types of the wire protocol.

use bytes::Bytes;

/// One client request: the flattened token list of a decoded frame,
/// e.g. `["SET", "k", "v"]`. Unit of queueing and of log persistence.
pub type CommandBatch = Vec<WireValue>;

/// A single protocol value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    /// `+OK\r\n`
    SimpleStatus(String),

    /// `-ERR message\r\n`
    Error(String),

    /// `:42\r\n`
    Integer(i64),

    /// `$3\r\nfoo\r\n`, or `$-1\r\n` when `None`
    BulkBytes(Option<Bytes>),

    /// `*2\r\n...`
    Array(Vec<WireValue>),
}

impl WireValue {
    /// `+OK`
    pub fn ok() -> Self {
        WireValue::SimpleStatus("OK".to_string())
    }

    /// Null bulk string
    pub fn null() -> Self {
        WireValue::BulkBytes(None)
    }

    /// Bulk string from anything byte-like
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        WireValue::BulkBytes(Some(data.into()))
    }

    /// Simple status line
    pub fn status(text: impl Into<String>) -> Self {
        WireValue::SimpleStatus(text.into())
    }

    /// `-ERR {message}`
    pub fn error(message: impl std::fmt::Display) -> Self {
        WireValue::Error(format!("ERR {}", message))
    }

    /// Array of bulk strings
    pub fn bulk_array<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        WireValue::Array(items.into_iter().map(WireValue::bulk).collect())
    }

    /// Raw bytes of a token. Status lines count too, since inline requests
    /// decode as status values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            WireValue::BulkBytes(Some(b)) => Some(b),
            WireValue::SimpleStatus(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Token as UTF-8 text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, WireValue::Error(_))
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        WireValue::Integer(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::bulk(value.as_bytes().to_vec())
    }
}
