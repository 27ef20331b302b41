//! Smoke tests for the shared helpers.

use ackframe::{ConnectionHooks, Frame, FrameKind, Value};
use ackframe_testing::{
    ack_bytes,
    chunked,
    connection_pair,
    echo_hooks,
    frame_bytes,
    raw_peer,
    request_bytes,
};
use serde_json::json;

#[test]
fn request_bytes_start_with_magic() {
    let bytes = request_bytes(1, 2.0, &Value::from("hi"));
    assert_eq!(&bytes[..2], &[0xA5, 0x5A]);
    assert_eq!(bytes.len(), 26);
    assert_eq!(chunked(&bytes, 10).len(), 3);
}

#[test]
fn frame_bytes_match_declared_length() {
    let frame = Frame::ack(4, Some(1.0), &Value::from(12)).expect("ack");
    assert_eq!(frame_bytes(&frame).len(), frame.header.length as usize);
}

#[tokio::test]
async fn pair_round_trips_through_echo_server() {
    let (client, _server) = connection_pair(ConnectionHooks::new(), echo_hooks());
    let response = client.send("hello").await.expect("acked");
    assert_eq!(response.value, Value::from(json!({"0": "hello"})));
}

#[tokio::test]
async fn raw_peer_sees_requests_and_acks_them() {
    let (connection, mut peer) = raw_peer(ConnectionHooks::new(), Default::default());
    let pending = tokio::spawn(async move { connection.send(5).await });
    let (frame, value) = peer.read_value().await;
    assert_eq!(frame.header.kind(), Ok(FrameKind::Message));
    assert_eq!(value, Value::from(5));
    peer.write(&ack_bytes(frame.header.sequence, &Value::from("ok")))
        .await;
    let response = pending.await.expect("join").expect("acked");
    assert_eq!(response.value, Value::from("ok"));
}
