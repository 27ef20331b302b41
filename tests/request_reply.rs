//! End-to-end request/reply behaviour between two in-memory connections.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use ackframe::{
    ConnectionConfig,
    ConnectionHooks,
    ConnectionState,
    Error,
    ErrorKind,
    Meta,
    Replies,
    Value,
};
use ackframe_testing::{connection_pair, connection_pair_with, echo_hooks};
use rstest::rstest;
use serde_json::json;

fn hooks<F>(handler: F) -> ConnectionHooks
where
    F: Fn(Value, &Meta, &mut Replies) -> Result<(), ackframe::HandlerError>
        + Send
        + Sync
        + 'static,
{
    ConnectionHooks::new().on_data(handler)
}

#[tokio::test]
async fn both_sides_can_send_requests() {
    let (client, server) = connection_pair(echo_hooks(), echo_hooks());

    let from_client = client.send("up").await.expect("client send");
    let from_server = server.send("down").await.expect("server send");

    assert_eq!(from_client.value, Value::from(json!({"0": "up"})));
    assert_eq!(from_server.value, Value::from(json!({"0": "down"})));
    assert_eq!(client.state(), ConnectionState::Open);
}

#[tokio::test]
async fn concurrent_sends_resolve_to_their_own_replies() {
    let (client, _server) = connection_pair(ConnectionHooks::new(), echo_hooks());
    let sends = (0..20).map(|i| {
        let client = client.clone();
        tokio::spawn(async move { (i, client.send(i).await) })
    });
    let mut sequences = Vec::new();
    for send in sends {
        let (i, response) = send.await.expect("join");
        let response = response.expect("acked");
        assert_eq!(response.get(0u32), Some(Ok(Value::from(i))));
        sequences.push(response.meta.sequence);
    }
    sequences.sort_unstable();
    sequences.dedup();
    assert_eq!(sequences.len(), 20);
}

#[tokio::test]
async fn bulk_sends_in_both_directions_all_settle() {
    let (client, server) = connection_pair(ConnectionHooks::new(), ConnectionHooks::new());
    let sends = [client, server].into_iter().flat_map(|side| {
        (0..40).map(move |_| {
            let side = side.clone();
            tokio::spawn(async move { side.send(vec![7u8; 64 * 1024]).await })
        })
    });
    let sends: Vec<_> = sends.collect();

    let results = tokio::time::timeout(Duration::from_secs(10), futures::future::join_all(sends))
        .await
        .expect("both sides kept reading while writing");
    for result in results {
        let response = result.expect("join").expect("acked");
        assert!(response.value.is_null());
    }
}

#[tokio::test]
async fn replies_are_merged_by_tag() {
    let server = hooks(|_, _, replies| {
        replies.reply_tagged("a", 1);
        replies.add(
            Some("b".into()),
            Error::new(ErrorKind::RemoteRuntime, "rejected"),
        );
        replies.defer_tagged("c", async { Ok(Value::from(3)) });
        Ok(())
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);

    let response = client.send(Value::Null).await.expect("acked");
    assert_eq!(response.get("a"), Some(Ok(Value::from(1))));
    assert_eq!(response.get("c"), Some(Ok(Value::from(3))));
    let Some(Err(err)) = response.get("b") else {
        panic!("b should hold an error");
    };
    assert_eq!(err.kind(), ErrorKind::RemoteRuntime);
    assert_eq!(err.message(), "rejected");
}

#[tokio::test]
async fn nak_tag_turns_reply_into_rejection() {
    let server = hooks(|_, _, replies| {
        replies.reply(1);
        replies.nak(Error::new(ErrorKind::RemoteRuntime, "no thanks").with_field("code", "EDENIED"));
        Ok(())
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);

    let err = client.send("please").await.expect_err("nak");
    assert_eq!(err.kind(), ErrorKind::RemoteRuntime);
    assert_eq!(err.message(), "no thanks");
    assert_eq!(err.code(), Some("EDENIED"));
}

#[rstest]
#[case::truthy(Value::from(true), true)]
#[case::falsy(Value::from(false), false)]
#[case::zero(Value::from(0), false)]
#[tokio::test]
async fn plain_nak_values_follow_truthiness(#[case] flag: Value, #[case] rejected: bool) {
    let server = hooks(move |_, _, replies| {
        replies.reply_tagged("nak", flag.clone());
        Ok(())
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);

    let result = client.send(Value::Null).await;
    assert_eq!(result.is_err(), rejected, "{result:?}");
    if let Err(err) = result {
        assert_eq!(err.kind(), ErrorKind::RemoteRuntime);
        assert_eq!(err.message(), "Nak");
    }
}

#[tokio::test]
async fn deferred_failures_nak_when_tagged_nak() {
    let server = hooks(|_, _, replies| {
        replies.defer_tagged("nak", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err(Error::new(ErrorKind::RemoteRuntime, "late failure"))
        });
        Ok(())
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);
    let err = client.send(1).await.expect_err("nak");
    assert_eq!(err.message(), "late failure");
}

#[tokio::test]
async fn buffers_in_replies_are_remote_encode_errors() {
    let server = hooks(|_, _, replies| {
        replies.reply(vec![1u8, 2, 3]);
        Ok(())
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);
    let err = client.send(1).await.expect_err("nak");
    assert_eq!(err.kind(), ErrorKind::RemoteEncode);
    assert_eq!(err.name(), "RemoteEncodeError");
}

#[tokio::test]
async fn handler_errors_reach_the_sender() {
    let server = hooks(|_, _, _| Err(Box::new(std::io::Error::other("disk on fire"))));
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);
    let err = client.send("x").await.expect_err("nak");
    assert_eq!(err.kind(), ErrorKind::RemoteRuntime);
    assert_eq!(err.message(), "disk on fire");
}

#[tokio::test]
async fn typed_handler_errors_keep_their_fields() {
    let server = hooks(|_, _, _| {
        Err(Box::new(
            Error::new(ErrorKind::Remote, "quota").with_field("limit", 10),
        ))
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);
    let err = client.send("x").await.expect_err("nak");
    assert_eq!(err.field("limit"), Some(&json!(10)));
}

#[tokio::test]
async fn handler_sees_request_metadata() {
    let seen = Arc::new(Mutex::new(None));
    let record = Arc::clone(&seen);
    let server = hooks(move |value, meta, _| {
        *record.lock().expect("lock") = Some((value, *meta));
        Ok(())
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);

    let response = client.send("meta").await.expect("acked");
    let (value, meta) = seen.lock().expect("lock").clone().expect("handler ran");
    assert_eq!(value, Value::from("meta"));
    assert_eq!(meta.sequence, response.meta.sequence);
    assert_eq!(meta.timestamp, response.meta.timestamp);
    assert_eq!(meta.length, 24 + 4);
    assert!(response.value.is_null());
}

#[tokio::test(start_paused = true)]
async fn default_send_timeout_applies() {
    let silent = hooks(|_, _, replies| {
        replies.defer(futures::future::pending());
        Ok(())
    });
    let config = ConnectionConfig::default().send_timeout(Some(Duration::from_millis(100)));
    let (client, _server) = connection_pair_with(
        (ConnectionHooks::new(), config),
        (silent, ConnectionConfig::default()),
    );
    let err = client.send("anyone?").await.expect_err("timeout");
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.field("sentAt").is_some());
}

#[tokio::test]
async fn close_rejects_pending_and_peer_sees_clean_close() {
    let (closed_tx, mut closed_rx) = tokio::sync::mpsc::unbounded_channel();
    let silent = hooks(|_, _, replies| {
        replies.defer(futures::future::pending());
        Ok(())
    })
    .on_close(move |had_error| {
        let _ = closed_tx.send(had_error);
    });
    let (client, server) = connection_pair(ConnectionHooks::new(), silent);

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.send(1).await }
    });
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    client.close();

    let err = pending.await.expect("join").expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::Closed);
    assert_eq!(closed_rx.recv().await, Some(false));
    server.closed().await;
    assert!(client.send(2).await.is_err());
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct Order {
    id: u32,
    items: Vec<String>,
}

#[tokio::test]
async fn typed_payloads_travel_as_json_objects() {
    let server = hooks(|value, _, replies| {
        let order: Order = value.deserialize()?;
        replies.reply_tagged("count", u32::try_from(order.items.len())?);
        Ok(())
    });
    let (client, _server) = connection_pair(ConnectionHooks::new(), server);
    let order = Order {
        id: 7,
        items: vec!["tea".into(), "cake".into()],
    };

    let response = client
        .send(Value::serialize(&order).expect("serialize"))
        .await
        .expect("acked");
    assert_eq!(response.get("count"), Some(Ok(Value::from(2))));

    let err = client.send("not an order").await.expect_err("nak");
    assert_eq!(err.kind(), ErrorKind::Decode);
}
