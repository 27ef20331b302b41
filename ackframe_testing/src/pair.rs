//! In-memory connection pairs and scripted peers.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use ackframe::{
    Connection,
    ConnectionConfig,
    ConnectionHooks,
    Frame,
    Meta,
    Replies,
    Value,
    buffer::{Inbound, ReceiveBuffer},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

const DUPLEX_CAPACITY: usize = 256 * 1024;

/// Two connections joined by an in-memory stream, both actors spawned.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
#[must_use]
pub fn connection_pair(
    client_hooks: ConnectionHooks,
    server_hooks: ConnectionHooks,
) -> (Connection, Connection) {
    connection_pair_with(
        (client_hooks, ConnectionConfig::default()),
        (server_hooks, ConnectionConfig::default()),
    )
}

/// Like [`connection_pair`] with explicit configuration for each side.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
#[must_use]
pub fn connection_pair_with(
    client: (ConnectionHooks, ConnectionConfig),
    server: (ConnectionHooks, ConnectionConfig),
) -> (Connection, Connection) {
    let (a, b) = duplex(DUPLEX_CAPACITY);
    let (client_conn, client_actor) = Connection::from_stream(a, client.0, client.1);
    let (server_conn, server_actor) = Connection::from_stream(b, server.0, server.1);
    tokio::spawn(client_actor.run());
    tokio::spawn(server_actor.run());
    (client_conn, server_conn)
}

/// Hooks replying to every request with the request value.
#[must_use]
pub fn echo_hooks() -> ConnectionHooks {
    ConnectionHooks::new().on_data(|value: Value, _: &Meta, replies: &mut Replies| {
        replies.reply(value);
        Ok(())
    })
}

/// A connection wired to a [`RawPeer`] that speaks the wire format by hand.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
#[must_use]
pub fn raw_peer(hooks: ConnectionHooks, config: ConnectionConfig) -> (Connection, RawPeer) {
    let (local, remote) = duplex(DUPLEX_CAPACITY);
    let (connection, actor) = Connection::from_stream(local, hooks, config);
    tokio::spawn(actor.run());
    (connection, RawPeer::new(remote))
}

/// Scripted end of an in-memory stream.
pub struct RawPeer {
    stream: DuplexStream,
    buffer: ReceiveBuffer,
}

impl RawPeer {
    #[must_use]
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buffer: ReceiveBuffer::default(),
        }
    }

    /// Write raw bytes to the connection.
    ///
    /// # Panics
    ///
    /// Panics if the connection side of the stream is gone.
    pub async fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("peer write");
    }

    /// Read the next complete frame written by the connection.
    ///
    /// # Panics
    ///
    /// Panics on malformed frames or when the stream closes first.
    pub async fn read_frame(&mut self) -> Frame {
        loop {
            if let Some(Inbound::Frame(frame)) = self.buffer.next_frame().expect("valid frame") {
                return frame;
            }
            let n = self
                .buffer
                .read_from(&mut self.stream)
                .await
                .expect("peer read");
            assert_ne!(n, 0, "connection closed while the peer awaited a frame");
        }
    }

    /// Read the next frame and decode its payload.
    ///
    /// # Panics
    ///
    /// See [`RawPeer::read_frame`].
    pub async fn read_value(&mut self) -> (Frame, Value) {
        let frame = self.read_frame().await;
        let value = Value::decode(frame.header.payload_type, frame.payload.clone())
            .expect("decodable payload");
        (frame, value)
    }

    /// Whether the connection has closed its side of the stream.
    pub async fn at_eof(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(self.stream.read(&mut byte).await, Ok(0) | Err(_))
    }
}

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding to an ephemeral localhost
/// port.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr)
}
