//! Raw frame byte builders.

use ackframe::{Error, Frame, Value};
use bytes::BytesMut;

/// Serialize `frame` exactly as it travels on the wire.
#[must_use]
pub fn frame_bytes(frame: &Frame) -> Vec<u8> {
    let mut bytes = BytesMut::with_capacity(frame.header.length as usize);
    frame.header.write(&mut bytes);
    bytes.extend_from_slice(&frame.payload);
    bytes.to_vec()
}

/// Bytes of a request frame carrying `value`, stamped with `timestamp`.
///
/// # Panics
///
/// Panics if `value` cannot be encoded.
#[must_use]
pub fn request_bytes(sequence: u32, timestamp: f64, value: &Value) -> Vec<u8> {
    let (payload_type, payload) = value.encode().expect("encode request value");
    let frame = Frame::message(sequence, timestamp, payload_type, payload).expect("request frame");
    frame_bytes(&frame)
}

/// Bytes of an ACK frame for `sequence` without a timestamp.
///
/// # Panics
///
/// Panics if `value` cannot be encoded.
#[must_use]
pub fn ack_bytes(sequence: u32, value: &Value) -> Vec<u8> {
    frame_bytes(&Frame::ack(sequence, None, value).expect("ack frame"))
}

/// Bytes of a NAK frame carrying `error`.
///
/// # Panics
///
/// Panics if the error cannot be serialized.
#[must_use]
pub fn nak_bytes(sequence: u32, error: &Error) -> Vec<u8> {
    frame_bytes(&Frame::nak(sequence, None, error).expect("nak frame"))
}

/// Split `bytes` into owned chunks of at most `size` bytes.
///
/// # Panics
///
/// Panics if `size` is zero.
#[must_use]
pub fn chunked(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size).map(<[u8]>::to_vec).collect()
}
