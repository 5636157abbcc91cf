//! Codec Tests
//!
//! Tests for wire value encoding/decoding.

use std::io::Cursor;

use bytes::{Bytes, BytesMut};
use ringkv::error::ProtocolError;
use ringkv::protocol::{
    decode, decode_frame, encode, encode_to_vec, read_frame, write_frame, WireValue, MAX_LINE_LEN,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn decode_all(bytes: &[u8]) -> Result<Vec<WireValue>, ProtocolError> {
    decode(&mut Cursor::new(bytes))
}

fn set_foo_bar() -> Vec<WireValue> {
    vec![
        WireValue::bulk("SET"),
        WireValue::bulk("foo"),
        WireValue::bulk("bar"),
    ]
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_set_foo_bar() {
    let encoded = encode_to_vec(&set_foo_bar());
    assert_eq!(encoded, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
}

#[test]
fn test_encode_single_values_are_bare() {
    assert_eq!(encode_to_vec(&[WireValue::ok()]), b"+OK\r\n");
    assert_eq!(encode_to_vec(&[WireValue::Error("ERR boom".into())]), b"-ERR boom\r\n");
    assert_eq!(encode_to_vec(&[WireValue::Integer(-42)]), b":-42\r\n");
    assert_eq!(encode_to_vec(&[WireValue::null()]), b"$-1\r\n");
    assert_eq!(encode_to_vec(&[WireValue::bulk(Bytes::new())]), b"$0\r\n\r\n");
}

#[test]
fn test_encode_empty_list_is_empty_array() {
    assert_eq!(encode_to_vec(&[]), b"*0\r\n");
}

#[test]
fn test_encode_nested_array() {
    let value = WireValue::Array(vec![
        WireValue::bulk("0"),
        WireValue::Array(vec![WireValue::bulk("a"), WireValue::bulk("b")]),
    ]);
    assert_eq!(
        encode_to_vec(&[value]),
        b"*2\r\n$1\r\n0\r\n*2\r\n$1\r\na\r\n$1\r\nb\r\n".as_slice()
    );
}

#[test]
fn test_encode_appends_to_buffer() {
    let mut out = BytesMut::from(&b"prefix"[..]);
    encode(&[WireValue::Integer(1)], &mut out);
    assert_eq!(&out[..], b"prefix:1\r\n");
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_set_foo_bar() {
    let batch = decode_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap();
    assert_eq!(batch, set_foo_bar());
}

#[test]
fn test_decode_each_type() {
    assert_eq!(decode_all(b"+PONG\r\n").unwrap(), vec![WireValue::status("PONG")]);
    assert_eq!(
        decode_all(b"-ERR nope\r\n").unwrap(),
        vec![WireValue::Error("ERR nope".into())]
    );
    assert_eq!(decode_all(b":1000\r\n").unwrap(), vec![WireValue::Integer(1000)]);
    assert_eq!(decode_all(b":-7\r\n").unwrap(), vec![WireValue::Integer(-7)]);
    assert_eq!(decode_all(b"$-1\r\n").unwrap(), vec![WireValue::null()]);
    assert_eq!(decode_all(b"$0\r\n\r\n").unwrap(), vec![WireValue::bulk(Bytes::new())]);
}

#[test]
fn test_decode_flattens_nested_arrays() {
    let batch = decode_all(b"*2\r\n*2\r\n:1\r\n:2\r\n:3\r\n").unwrap();
    assert_eq!(
        batch,
        vec![WireValue::Integer(1), WireValue::Integer(2), WireValue::Integer(3)]
    );
}

#[test]
fn test_decode_null_array_is_empty() {
    assert_eq!(decode_all(b"*-1\r\n").unwrap(), Vec::<WireValue>::new());
}

#[test]
fn test_decode_inline_request() {
    let batch = decode_all(b"PING\r\n").unwrap();
    assert_eq!(batch, vec![WireValue::status("PING")]);
}

#[test]
fn test_decode_skips_zero_padding() {
    let mut bytes = vec![0u8; 64];
    bytes.extend_from_slice(b":5\r\n");
    assert_eq!(decode_all(&bytes).unwrap(), vec![WireValue::Integer(5)]);
}

#[test]
fn test_decode_only_padding_is_incomplete() {
    let bytes = vec![0u8; 1 << 16];
    assert_eq!(decode_all(&bytes), Err(ProtocolError::Incomplete));
}

#[test]
fn test_decode_overlong_inline_line_is_malformed() {
    let mut bytes = vec![b'A'; MAX_LINE_LEN + 1];
    assert!(matches!(
        decode_all(&bytes),
        Err(ProtocolError::Malformed(reason)) if reason == "too big inline request"
    ));

    // Just under the limit it is still only waiting for its terminator
    bytes.truncate(MAX_LINE_LEN);
    assert_eq!(decode_all(&bytes), Err(ProtocolError::Incomplete));
}

#[test]
fn test_decode_non_utf8_inline_is_malformed() {
    assert!(matches!(
        decode_all(b"SET k \xff\xfe\r\n"),
        Err(ProtocolError::Malformed(_))
    ));
}

#[test]
fn test_decode_binary_bulk_body() {
    let batch = decode_all(b"$4\r\n\r\n\0\xff\r\n").unwrap();
    assert_eq!(batch, vec![WireValue::bulk(&b"\r\n\0\xff"[..])]);
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_decode_incomplete_restores_position() {
    let bytes = b"*2\r\n$3\r\nGET\r\n$3\r\nfo";
    let mut cursor = Cursor::new(&bytes[..]);
    assert_eq!(decode(&mut cursor), Err(ProtocolError::Incomplete));
    assert_eq!(cursor.position(), 0);
}

#[test]
fn test_decode_bulk_length_mismatch_is_malformed() {
    let err = decode_all(b"$3\r\nfoobar\r\n").unwrap_err();
    assert!(matches!(err, ProtocolError::Malformed(_)));
}

#[test]
fn test_decode_bad_number_is_malformed() {
    let err = decode_all(b":12x\r\n").unwrap_err();
    assert!(matches!(err, ProtocolError::Malformed(_)));
}

#[test]
fn test_decode_oversized_lengths_are_malformed() {
    assert!(matches!(
        decode_all(b"$999999999999\r\n"),
        Err(ProtocolError::Malformed(_))
    ));
    assert!(matches!(
        decode_all(b"*99999999\r\n"),
        Err(ProtocolError::Malformed(_))
    ));
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_flat_batch() {
    let batch = vec![
        WireValue::bulk("HSET"),
        WireValue::bulk("h"),
        WireValue::bulk(Bytes::new()),
        WireValue::null(),
        WireValue::Integer(i64::MIN),
        WireValue::status("OK"),
        WireValue::Error("ERR x".into()),
    ];
    assert_eq!(decode_all(&encode_to_vec(&batch)).unwrap(), batch);
}

#[test]
fn test_round_trip_nested_preserves_order() {
    let value = WireValue::Array(vec![
        WireValue::bulk("a"),
        WireValue::Array(vec![WireValue::bulk("b"), WireValue::bulk("c")]),
        WireValue::bulk("d"),
    ]);
    let decoded = decode_all(&encode_to_vec(&[value])).unwrap();
    assert_eq!(
        decoded,
        vec![
            WireValue::bulk("a"),
            WireValue::bulk("b"),
            WireValue::bulk("c"),
            WireValue::bulk("d"),
        ]
    );
}

// =============================================================================
// Incremental Framing Tests
// =============================================================================

#[test]
fn test_decode_frame_byte_at_a_time() {
    let encoded = encode_to_vec(&set_foo_bar());
    let mut buf = BytesMut::new();

    for (i, byte) in encoded.iter().enumerate() {
        buf.extend_from_slice(&[*byte]);
        let result = decode_frame(&mut buf).unwrap();
        if i + 1 < encoded.len() {
            assert!(result.is_none(), "frame completed early at byte {}", i);
            assert_eq!(buf.len(), i + 1);
        } else {
            assert_eq!(result, Some(set_foo_bar()));
        }
    }
    assert!(buf.is_empty());
}

#[test]
fn test_decode_frame_pipelined() {
    let mut buf = BytesMut::new();
    encode(&[WireValue::bulk("PING")], &mut buf);
    encode(&set_foo_bar(), &mut buf);
    buf.extend_from_slice(b"*1\r\n$4\r\nPI");

    assert_eq!(decode_frame(&mut buf).unwrap(), Some(vec![WireValue::bulk("PING")]));
    assert_eq!(decode_frame(&mut buf).unwrap(), Some(set_foo_bar()));
    assert_eq!(decode_frame(&mut buf).unwrap(), None);
    assert_eq!(&buf[..], b"*1\r\n$4\r\nPI");
}

#[test]
fn test_decode_frame_drops_leading_junk() {
    let mut buf = BytesMut::from(&b"1234567890"[..]);
    assert_eq!(decode_frame(&mut buf).unwrap(), None);
    assert!(buf.is_empty());

    buf.extend_from_slice(b"\r\n99*1\r\n$4\r\nPI");
    assert_eq!(decode_frame(&mut buf).unwrap(), None);
    assert_eq!(&buf[..], b"*1\r\n$4\r\nPI");

    buf.extend_from_slice(b"NG\r\n");
    assert_eq!(decode_frame(&mut buf).unwrap(), Some(vec![WireValue::bulk("PING")]));
}

#[test]
fn test_decode_frame_malformed_leaves_buffer() {
    let mut buf = BytesMut::from(&b"$2\r\nabc\r\n"[..]);
    assert!(decode_frame(&mut buf).is_err());
    assert_eq!(buf.len(), 9);
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_write_then_read_frames() {
    let mut wire = Vec::new();
    write_frame(&mut wire, &set_foo_bar()).unwrap();
    write_frame(&mut wire, &[WireValue::ok()]).unwrap();

    let mut reader = Cursor::new(wire);
    let mut buf = BytesMut::new();
    assert_eq!(read_frame(&mut reader, &mut buf).unwrap(), Some(set_foo_bar()));
    assert_eq!(read_frame(&mut reader, &mut buf).unwrap(), Some(vec![WireValue::ok()]));
    assert_eq!(read_frame(&mut reader, &mut buf).unwrap(), None);
}

#[test]
fn test_read_frame_truncated_stream_is_error() {
    let mut reader = Cursor::new(b"*2\r\n$3\r\nGET".to_vec());
    let mut buf = BytesMut::new();
    assert!(read_frame(&mut reader, &mut buf).is_err());
}
