//! Unit tests for headers and payload values.

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use rstest::rstest;
use serde_json::json;

use super::*;
use crate::error::{CODE_BAD_FLAGS, CODE_BAD_HEADER, CODE_BAD_LENGTH};

fn encoded(frame: &Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    frame.header.write(&mut buf);
    buf.extend_from_slice(&frame.payload);
    buf
}

#[test]
fn header_layout_is_big_endian() {
    let frame = Frame::message(0x0102_0304, 1.5, PayloadType::String, Bytes::from_static(b"hi"))
        .expect("frame");
    let buf = encoded(&frame);
    assert_eq!(&buf[..2], &MAGIC);
    assert_eq!(&buf[2..6], &26u32.to_be_bytes());
    assert_eq!(&buf[6..10], &[1, 2, 3, 4]);
    assert_eq!(&buf[10..18], &1.5f64.to_be_bytes());
    assert_eq!(buf[18], FrameFlags::HAS_TIMESTAMP.bits());
    assert_eq!(buf[19], PayloadType::String.tag());
    assert_eq!(&buf[20..24], &[0; 4]);
    assert_eq!(&buf[24..], b"hi");
}

#[test]
fn peek_waits_for_full_header() {
    let frame = Frame::message(1, 0.0, PayloadType::Null, Bytes::new()).expect("frame");
    let buf = encoded(&frame);
    assert_eq!(FrameHeader::peek(&buf[..23]).expect("partial header"), None);
    assert_eq!(
        FrameHeader::peek(&buf).expect("full header"),
        Some(frame.header)
    );
}

#[test]
fn peek_rejects_bad_magic() {
    let mut buf = encoded(&Frame::message(1, 0.0, PayloadType::Null, Bytes::new()).expect("frame"));
    buf[0] = 0;
    let err = FrameHeader::peek(&buf).expect_err("bad magic");
    assert_eq!(err.code(), Some(CODE_BAD_HEADER));
    assert!(err.should_disconnect());
}

#[test]
fn peek_rejects_length_below_header() {
    let mut buf = encoded(&Frame::message(1, 0.0, PayloadType::Null, Bytes::new()).expect("frame"));
    buf[2..6].copy_from_slice(&10u32.to_be_bytes());
    let err = FrameHeader::peek(&buf).expect_err("bad length");
    assert_eq!(err.code(), Some(CODE_BAD_LENGTH));
}

#[rstest]
#[case::message(FrameFlags::empty(), FrameKind::Message)]
#[case::ack(FrameFlags::ACK, FrameKind::Ack)]
#[case::nak(FrameFlags::NAK | FrameFlags::HAS_TIMESTAMP, FrameKind::Nak)]
fn kind_follows_flags(#[case] flags: FrameFlags, #[case] expected: FrameKind) {
    let frame = Frame::new(9, None, flags, PayloadType::Null, Bytes::new()).expect("frame");
    assert_eq!(frame.header.kind().expect("kind"), expected);
}

#[test]
fn ack_and_nak_together_is_rejected() {
    let frame = Frame::new(
        9,
        None,
        FrameFlags::ACK | FrameFlags::NAK,
        PayloadType::Null,
        Bytes::new(),
    )
    .expect("frame");
    let err = frame.header.kind().expect_err("both flags");
    assert_eq!(err.code(), Some(CODE_BAD_FLAGS));
    assert!(!err.should_disconnect());
}

#[test]
fn timestamp_requires_flag() {
    let frame = Frame::ack(3, None, &Value::Null).expect("frame");
    assert_eq!(frame.meta().timestamp, None);
    let frame = Frame::ack(3, Some(42.0), &Value::Null).expect("frame");
    assert_eq!(frame.meta().timestamp, Some(42.0));
    assert_eq!(frame.meta().length, 24);
}

#[test]
fn nak_payload_is_error_json() {
    let err = crate::Error::new(crate::ErrorKind::RemoteRuntime, "boom");
    let frame = Frame::nak(5, None, &err).expect("frame");
    let value = Value::decode(frame.header.payload_type, frame.payload).expect("decode");
    assert_eq!(value, Value::Object(err.to_json()));
}

#[rstest]
#[case::null(Value::Null, b"" as &[u8])]
#[case::string(Value::from("héllo"), "héllo".as_bytes())]
#[case::integer(Value::from(42), b"42")]
#[case::negative(Value::from(-7), b"-7")]
#[case::float(Value::from(919.0), b"919.0")]
#[case::fraction(Value::from(0.25), b"0.25")]
#[case::buffer(Value::from(vec![0, 1, 255]), &[0, 1, 255])]
#[case::object(Value::from(json!({"a": [1, 2]})), br#"{"a":[1,2]}"#)]
fn values_round_trip(#[case] value: Value, #[case] wire: &[u8]) {
    let (payload_type, payload) = value.encode().expect("encode");
    assert_eq!(payload.as_ref(), wire);
    let decoded = Value::decode(payload_type.tag(), payload).expect("decode");
    assert_eq!(decoded, value);
}

#[test]
fn integers_and_floats_stay_distinct() {
    let decoded = Value::decode(PayloadType::Number.tag(), Bytes::from_static(b"919")).expect("int");
    assert_eq!(decoded.as_number(), Some(Number::Integer(919)));
    let decoded =
        Value::decode(PayloadType::Number.tag(), Bytes::from_static(b"919.0")).expect("float");
    assert_eq!(decoded.as_number(), Some(Number::Float(919.0)));
}

#[rstest]
#[case::unknown_type(9, b"" as &[u8], "Unrecognised type")]
#[case::bad_number(PayloadType::Number.tag(), b"abc", "Invalid number: abc")]
fn decode_failures_name_the_problem(
    #[case] tag: u8,
    #[case] payload: &[u8],
    #[case] message: &str,
) {
    let err = Value::decode(tag, Bytes::copy_from_slice(payload)).expect_err("decode failure");
    assert_eq!(err.kind(), crate::ErrorKind::Decode);
    assert_eq!(err.message(), message);
}

#[test]
fn malformed_json_reports_parser_message() {
    let err = Value::decode(PayloadType::Object.tag(), Bytes::from_static(b"{not json"))
        .expect_err("bad json");
    assert!(err.message().contains("key must be a string"), "{err}");
}

#[test]
fn serialize_rejects_non_string_keys() {
    let mut map = std::collections::HashMap::new();
    map.insert((1, 2), "x");
    let err = Value::serialize(&map).expect_err("tuple keys");
    assert_eq!(err.kind(), crate::ErrorKind::Encode);
}

#[rstest]
#[case::null(Value::Null, false)]
#[case::empty_string(Value::from(""), false)]
#[case::zero(Value::from(0), false)]
#[case::nan(Value::from(f64::NAN), false)]
#[case::json_false(Value::from(json!(false)), false)]
#[case::json_true(Value::from(json!(true)), true)]
#[case::text(Value::from("x"), true)]
#[case::empty_object(Value::from(json!({})), true)]
fn truthiness(#[case] value: Value, #[case] expected: bool) {
    assert_eq!(value.is_truthy(), expected);
}

#[test]
fn non_finite_floats_have_no_json_form() {
    assert!(Value::from(f64::INFINITY).to_json().is_err());
    assert!(Value::from(vec![1]).to_json().is_err());
}

proptest! {
    #[test]
    fn numbers_round_trip(n in any::<i64>(), f in any::<f64>().prop_filter("finite", |f| f.is_finite())) {
        for value in [Value::from(n), Value::from(f)] {
            let (payload_type, payload) = value.encode().expect("encode");
            prop_assert_eq!(Value::decode(payload_type.tag(), payload).expect("decode"), value);
        }
    }

    #[test]
    fn strings_round_trip(s in ".*") {
        let value = Value::from(s);
        let (payload_type, payload) = value.encode().expect("encode");
        prop_assert_eq!(Value::decode(payload_type.tag(), payload).expect("decode"), value);
    }
}
