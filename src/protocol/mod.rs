//! Protocol Module
//!
//! Defines the wire protocol for client-server communication and for the
//! on-disk log: both speak the same framing.
//!
//! ## Value Types
//! - `+` simple status
//! - `-` error
//! - `:` signed 64-bit integer
//! - `$` bulk bytes (nullable)
//! - `*` array
//!
//! ## Decode Outcomes
//! - complete frame: flattened token list, cursor advanced
//! - `Incomplete`: cursor untouched, wait for more bytes
//! - `Malformed`: cursor untouched, stream unusable past this point

mod codec;
mod value;

pub use codec::{
    decode, decode_frame, encode, encode_to_vec, read_frame, write_frame, MAX_ARRAY_LEN,
    MAX_BULK_LEN, MAX_LINE_LEN,
};
pub use value::{CommandBatch, WireValue};
