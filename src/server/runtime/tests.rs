//! Tests for server runtime behaviour.

use std::{
    io,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use rstest::rstest;
use tokio::{
    net::TcpListener,
    sync::oneshot,
    task::yield_now,
    time::{Duration, Instant, advance, timeout},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{AcceptLoopOptions, BackoffConfig, MockAcceptListener, accept_loop};
use crate::{
    config::ConnectionConfig,
    connection::ConnectionHooks,
    frame::Value,
    server::{
        HooksFactory,
        Server,
        connection::ConnectionSetup,
        test_util::{RawClient, bind_server, factory, free_listener},
    },
};

fn options(shutdown: &CancellationToken, tracker: &TaskTracker, backoff: BackoffConfig) -> AcceptLoopOptions {
    AcceptLoopOptions {
        setup: ConnectionSetup {
            config: ConnectionConfig::default(),
            on_connection: None,
            shutdown: shutdown.clone(),
        },
        tracker: tracker.clone(),
        backoff,
    }
}

#[rstest]
#[tokio::test]
async fn run_with_immediate_shutdown(factory: impl HooksFactory, free_listener: std::net::TcpListener) {
    let server = bind_server(factory, free_listener);
    let shutdown_future = async { tokio::time::sleep(Duration::from_millis(10)).await };
    let result = timeout(
        Duration::from_millis(1000),
        server.run_with_shutdown(shutdown_future),
    )
    .await;
    assert!(result.expect("server did not finish in time").is_ok());
}

#[rstest]
#[tokio::test]
async fn server_echoes_requests_and_signals_readiness(
    factory: impl HooksFactory,
    free_listener: std::net::TcpListener,
) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = Server::new(factory)
        .workers(2)
        .ready_signal(ready_tx)
        .bind_existing_listener(free_listener)
        .expect("bind");
    let addr = server.local_addr().expect("local addr");
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = stop_rx.await;
    }));
    ready_rx.await.expect("ready signal");

    let mut client = RawClient::connect(addr).await;
    client.send_request(9, &Value::from("hi")).await;
    let reply = client.read_frame().await;
    assert_eq!(reply.header.sequence, 9);
    assert_eq!(
        Value::decode(reply.header.payload_type, reply.payload).expect("decode"),
        Value::from(serde_json::json!({"0": "hi"}))
    );

    let _ = stop_tx.send(());
    timeout(Duration::from_secs(1), handle)
        .await
        .expect("server stopped")
        .expect("join")
        .expect("run");
    assert!(client.at_eof().await);
}

#[rstest]
#[tokio::test]
async fn each_worker_shares_the_factory(free_listener: std::net::TcpListener) {
    let call_count = Arc::new(AtomicUsize::new(0));
    let clone = Arc::clone(&call_count);
    let factory = move || {
        clone.fetch_add(1, Ordering::SeqCst);
        ConnectionHooks::new()
    };
    let server = Server::new(factory)
        .workers(3)
        .bind_existing_listener(free_listener)
        .expect("Failed to bind");
    assert_eq!(server.worker_count(), 3);
    let addr = server.local_addr().expect("local addr");
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = rx.await;
    }));

    let mut clients = Vec::new();
    for sequence in 0..2 {
        let mut client = RawClient::connect(addr).await;
        client.send_request(sequence, &Value::Null).await;
        assert_eq!(client.read_frame().await.header.sequence, sequence);
        clients.push(client);
    }
    assert_eq!(call_count.load(Ordering::SeqCst), 2);

    let _ = tx.send(());
    handle.await.expect("join").expect("run");
}

#[rstest]
#[tokio::test]
async fn bind_rejects_tiny_frame_limits(factory: impl HooksFactory, free_listener: std::net::TcpListener) {
    let err = Server::new(factory)
        .max_frame_size(8)
        .bind_existing_listener(free_listener)
        .err()
        .expect("config rejected");
    assert!(matches!(err, crate::server::ServerError::Config(_)));
}

#[rstest]
#[tokio::test]
async fn accept_loop_stops_on_shutdown_signal(factory: impl HooksFactory) {
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let listener = Arc::new(
        TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener"),
    );

    tracker.spawn(accept_loop(
        listener,
        factory,
        options(&token, &tracker, BackoffConfig::default()),
    ));

    token.cancel();
    tracker.close();

    let result = timeout(Duration::from_millis(100), tracker.wait()).await;
    assert!(result.is_ok());
}

/// Creates a mock listener that fails every accept and records call times.
fn failing_listener(calls: &Arc<Mutex<Vec<Instant>>>, num_calls: usize) -> MockAcceptListener {
    let mut listener = MockAcceptListener::new();
    let call_log = Arc::clone(calls);
    listener
        .expect_accept()
        .returning(move || {
            let call_log = Arc::clone(&call_log);
            Box::pin(async move {
                call_log.lock().expect("lock").push(Instant::now());
                Err(io::Error::other("mock error"))
            })
        })
        .times(num_calls);
    listener
        .expect_local_addr()
        .returning(|| Ok("127.0.0.1:0".parse().expect("addr parse")))
        .times(num_calls);
    listener
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn accept_errors_back_off_exponentially(factory: impl HooksFactory) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(failing_listener(&calls, 4));
    let token = CancellationToken::new();
    let tracker = TaskTracker::new();
    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };

    tracker.spawn(accept_loop(
        listener,
        factory,
        options(&token, &tracker, backoff),
    ));
    yield_now().await;
    assert_eq!(calls.lock().expect("lock").len(), 1);

    for ms in [5, 10, 20] {
        advance(Duration::from_millis(ms)).await;
        yield_now().await;
    }

    token.cancel();
    advance(Duration::from_millis(20)).await;
    yield_now().await;
    tracker.close();
    tracker.wait().await;

    let calls = calls.lock().expect("lock");
    let intervals: Vec<_> = calls
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect();
    assert_eq!(
        intervals,
        [
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(20),
        ]
    );
}
