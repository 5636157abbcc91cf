//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! +OK\r\n                      simple status
//! -ERR message\r\n             error
//! :1000\r\n                    integer
//! $3\r\nfoo\r\n                bulk ($-1\r\n = null, $0\r\n\r\n = empty)
//! *2\r\n$3\r\nGET\r\n$1\r\nk\r\n   array
//! PING\r\n                     inline request (decoded as a status line)
//! ```
//!
//! Arrays are flattened on decode: `*3 SET k v` comes back as the three
//! tokens `SET`, `k`, `v`. A request and its arguments are a single token
//! stream from the point of view of the command layer and the log.

use std::io::{Cursor, Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::{CommandBatch, WireValue};
use crate::error::{KvError, ProtocolError, Result};

/// Largest bulk body accepted (512 MiB)
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Largest array element count accepted
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024;

/// Longest line (inline request, status, length header) accepted (64 KiB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Arrays nested deeper than this are rejected
const MAX_DEPTH: usize = 32;

// =============================================================================
// Decoding
// =============================================================================

/// Decode one frame starting at the cursor position.
///
/// On success the cursor sits just past the frame. On any error the cursor is
/// restored to where the call started, so the caller can re-buffer and retry
/// after `ProtocolError::Incomplete`.
pub fn decode(cursor: &mut Cursor<&[u8]>) -> std::result::Result<CommandBatch, ProtocolError> {
    let start = cursor.position();
    let mut out = Vec::new();

    match decode_into(cursor, &mut out, 0) {
        Ok(()) => Ok(out),
        Err(e) => {
            cursor.set_position(start);
            Err(e)
        }
    }
}

/// Decode one frame from the front of `buf`, consuming it only when complete.
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn decode_frame(buf: &mut BytesMut) -> std::result::Result<Option<CommandBatch>, ProtocolError> {
    let (batch, consumed) = {
        let mut cursor = Cursor::new(&buf[..]);
        match decode(&mut cursor) {
            Ok(batch) => (batch, cursor.position() as usize),
            Err(ProtocolError::Incomplete) => {
                // Leading bytes that can never start a frame would be skipped
                // again on every retry
                let junk = buf
                    .iter()
                    .position(|&b| is_frame_start(b))
                    .unwrap_or(buf.len());
                buf.advance(junk);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    };

    buf.advance(consumed);
    Ok(Some(batch))
}

fn decode_into(
    cursor: &mut Cursor<&[u8]>,
    out: &mut Vec<WireValue>,
    depth: usize,
) -> std::result::Result<(), ProtocolError> {
    // Bytes that are neither a type tag nor a letter are skipped: this is how
    // stray separators and zero padding at the end of a segment are passed over.
    loop {
        let tag = read_u8(cursor)?;

        match tag {
            b'+' => {
                let line = read_line(cursor)?;
                out.push(WireValue::SimpleStatus(utf8_line(line)?));
                return Ok(());
            }
            b'-' => {
                let line = read_line(cursor)?;
                out.push(WireValue::Error(utf8_line(line)?));
                return Ok(());
            }
            b':' => {
                let value = read_number(cursor)?;
                out.push(WireValue::Integer(value));
                return Ok(());
            }
            b'$' => {
                out.push(read_bulk(cursor)?);
                return Ok(());
            }
            b'*' => {
                let count = read_number(cursor)?;
                if count == -1 {
                    return Ok(());
                }
                if !(0..=MAX_ARRAY_LEN).contains(&count) {
                    return Err(ProtocolError::Malformed(format!("invalid array length {}", count)));
                }
                if depth >= MAX_DEPTH {
                    return Err(ProtocolError::Malformed("arrays nested too deeply".to_string()));
                }
                out.reserve(count as usize);
                for _ in 0..count {
                    decode_into(cursor, out, depth + 1)?;
                }
                return Ok(());
            }
            c if c.is_ascii_alphabetic() => {
                let rest = read_line(cursor)?;
                let mut line = String::with_capacity(rest.len() + 1);
                line.push(c as char);
                line.push_str(&utf8_line(rest)?);
                out.push(WireValue::SimpleStatus(line));
                return Ok(());
            }
            _ => continue,
        }
    }
}

fn is_frame_start(b: u8) -> bool {
    matches!(b, b'+' | b'-' | b':' | b'$' | b'*') || b.is_ascii_alphabetic()
}

fn utf8_line(line: &[u8]) -> std::result::Result<String, ProtocolError> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::Malformed("invalid UTF-8 in line".to_string()))
}

fn read_bulk(cursor: &mut Cursor<&[u8]>) -> std::result::Result<WireValue, ProtocolError> {
    let len = read_number(cursor)?;
    if len == -1 {
        return Ok(WireValue::BulkBytes(None));
    }
    if !(0..=MAX_BULK_LEN).contains(&len) {
        return Err(ProtocolError::Malformed(format!("invalid bulk length {}", len)));
    }

    let len = len as usize;
    if Buf::remaining(cursor) < len + 2 {
        return Err(ProtocolError::Incomplete);
    }

    let body = cursor.copy_to_bytes(len);
    if cursor.get_u8() != b'\r' || cursor.get_u8() != b'\n' {
        return Err(ProtocolError::Malformed("bulk body not terminated by CRLF".to_string()));
    }

    Ok(WireValue::BulkBytes(Some(body)))
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> std::result::Result<u8, ProtocolError> {
    if !cursor.has_remaining() {
        return Err(ProtocolError::Incomplete);
    }
    Ok(cursor.get_u8())
}

/// Read up to (excluding) the next `\r\n` and step past it.
///
/// Lines longer than `MAX_LINE_LEN` are rejected without waiting for their end.
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> std::result::Result<&'a [u8], ProtocolError> {
    let buf: &'a [u8] = *cursor.get_ref();
    let start = cursor.position() as usize;
    let window = &buf[start..buf.len().min(start + MAX_LINE_LEN + 1)];

    let cr = match window.iter().position(|&b| b == b'\r') {
        Some(i) => start + i,
        None if window.len() > MAX_LINE_LEN => {
            return Err(ProtocolError::Malformed("too big inline request".to_string()));
        }
        None => return Err(ProtocolError::Incomplete),
    };

    match buf.get(cr + 1) {
        None => Err(ProtocolError::Incomplete),
        Some(b'\n') => {
            cursor.set_position((cr + 2) as u64);
            Ok(&buf[start..cr])
        }
        Some(_) => Err(ProtocolError::Malformed("CR not followed by LF".to_string())),
    }
}

fn read_number(cursor: &mut Cursor<&[u8]>) -> std::result::Result<i64, ProtocolError> {
    let line = read_line(cursor)?;
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            ProtocolError::Malformed(format!(
                "invalid number {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a token list.
///
/// A single value is written as its bare frame; any other length is wrapped
/// in an array frame whose declared count equals the list length.
pub fn encode(values: &[WireValue], out: &mut BytesMut) {
    if values.len() == 1 {
        encode_value(&values[0], out);
    } else {
        encode_array(values, out);
    }
}

/// Encode a token list into a fresh buffer
pub fn encode_to_vec(values: &[WireValue]) -> Vec<u8> {
    let mut out = BytesMut::new();
    encode(values, &mut out);
    out.to_vec()
}

fn encode_value(value: &WireValue, out: &mut BytesMut) {
    match value {
        WireValue::SimpleStatus(s) => write_line(b'+', s.as_bytes(), out),
        WireValue::Error(s) => write_line(b'-', s.as_bytes(), out),
        WireValue::Integer(n) => write_line(b':', n.to_string().as_bytes(), out),
        WireValue::BulkBytes(None) => out.put_slice(b"$-1\r\n"),
        WireValue::BulkBytes(Some(body)) => {
            write_line(b'$', body.len().to_string().as_bytes(), out);
            out.put_slice(body);
            out.put_slice(b"\r\n");
        }
        WireValue::Array(items) => encode_array(items, out),
    }
}

fn encode_array(items: &[WireValue], out: &mut BytesMut) {
    write_line(b'*', items.len().to_string().as_bytes(), out);
    for item in items {
        encode_value(item, out);
    }
}

fn write_line(tag: u8, content: &[u8], out: &mut BytesMut) {
    out.reserve(content.len() + 3);
    out.put_u8(tag);
    // A line cannot carry its own terminator
    for &b in content {
        out.put_u8(if b == b'\r' || b == b'\n' { b' ' } else { b });
    }
    out.put_slice(b"\r\n");
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete frame from a stream, buffering partial input in `buf`.
///
/// Returns `Ok(None)` on a clean EOF between frames.
pub fn read_frame<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<Option<CommandBatch>> {
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(batch) = decode_frame(buf)? {
            return Ok(Some(batch));
        }

        let n = reader.read(&mut chunk)?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(KvError::Protocol(ProtocolError::Incomplete));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Write a token list to a stream
pub fn write_frame<W: Write>(writer: &mut W, values: &[WireValue]) -> Result<()> {
    let mut out = BytesMut::new();
    encode(values, &mut out);
    writer.write_all(&out)?;
    writer.flush()?;
    Ok(())
}
