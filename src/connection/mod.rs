//! Live connections.
//!
//! A [`Connection`] is a cheap, cloneable handle to a connection actor that
//! owns the underlying stream. Handles send requests and control the
//! lifecycle; the actor does all I/O. The lifecycle only moves forward:
//! [`ConnectionState::Connecting`] → [`ConnectionState::Open`] →
//! [`ConnectionState::Closed`].

mod actor;
mod builder;
mod command;
mod counter;
mod hooks;
mod socket_options;
mod writer;

use std::{net::SocketAddr, time::Duration};

pub use actor::ConnectionActor;
pub use builder::ConnectionBuilder;
use command::Command;
pub use counter::active_connection_count;
pub use hooks::{CloseHandler, ConnectionHooks, DataHandler, ErrorHandler, HandlerError};
pub use socket_options::SocketOptions;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
};

use crate::{config::ConnectionConfig, error::Error, frame::Value, response::Response};

/// Lifecycle of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created but the actor has not started yet.
    Connecting,
    /// The actor is running.
    Open,
    /// Terminal; sends fail immediately.
    Closed,
}

/// Handle to a live connection.
///
/// # Examples
///
/// ```no_run
/// use ackframe::{Connection, Value};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ackframe::Error> {
/// let connection = Connection::builder()
///     .connect("127.0.0.1:6543".parse().expect("address"))
///     .await?;
/// let response = connection.send("ping").await?;
/// println!("{:?}", response.value);
/// connection.close();
/// connection.closed().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    send_timeout: Option<Duration>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
}

impl Connection {
    /// Start configuring an outbound connection.
    #[must_use]
    pub fn builder() -> ConnectionBuilder { ConnectionBuilder::new() }

    /// Wrap an established stream.
    ///
    /// The returned actor does nothing until [`ConnectionActor::run`] is
    /// polled, typically via `tokio::spawn`. Sends issued before that are
    /// queued.
    pub fn from_stream<S>(
        stream: S,
        hooks: ConnectionHooks,
        config: ConnectionConfig,
    ) -> (Self, ConnectionActor<S>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_addrs(stream, hooks, config, None, None)
    }

    /// Wrap an established TCP stream, recording both socket addresses.
    pub fn from_tcp(
        stream: TcpStream,
        hooks: ConnectionHooks,
        config: ConnectionConfig,
    ) -> (Self, ConnectionActor<TcpStream>) {
        let local_addr = stream.local_addr().ok();
        let peer_addr = stream.peer_addr().ok();
        Self::with_addrs(stream, hooks, config, local_addr, peer_addr)
    }

    fn with_addrs<S>(
        stream: S,
        hooks: ConnectionHooks,
        config: ConnectionConfig,
        local_addr: Option<SocketAddr>,
        peer_addr: Option<SocketAddr>,
    ) -> (Self, ConnectionActor<S>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);
        let actor = ConnectionActor::new(stream, hooks, config, command_rx, state_tx, peer_addr);
        let handle = Self {
            commands,
            state,
            send_timeout: config.default_send_timeout(),
            local_addr,
            peer_addr,
        };
        (handle, actor)
    }

    /// Send `value` and wait for its ACK or NAK, using the configured
    /// default timeout.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be encoded, the peer NAKs, the timeout
    /// elapses or the connection closes first.
    pub async fn send(&self, value: impl Into<Value>) -> Result<Response, Error> {
        self.request(value.into(), self.send_timeout).await
    }

    /// Send `value`, failing with a timeout error unless an ACK or NAK
    /// arrives within `timeout`.
    ///
    /// # Errors
    ///
    /// See [`Connection::send`].
    pub async fn send_with_timeout(
        &self,
        value: impl Into<Value>,
        timeout: Duration,
    ) -> Result<Response, Error> {
        self.request(value.into(), Some(timeout)).await
    }

    async fn request(&self, value: Value, timeout: Option<Duration>) -> Result<Response, Error> {
        if self.is_closed() {
            return Err(Error::cannot_write());
        }
        let (payload_type, payload) = value.encode()?;
        let (responder, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                payload_type,
                payload,
                timeout,
                responder,
            })
            .map_err(|_| Error::cannot_write())?;
        response.await.map_err(|_| Error::cannot_write())?
    }

    /// Stop reading from the transport. Already buffered frames are still
    /// processed; TCP flow control throttles the peer.
    pub fn pause(&self) { let _ = self.commands.send(Command::Pause); }

    /// Resume reading after [`Connection::pause`].
    pub fn resume(&self) { let _ = self.commands.send(Command::Resume); }

    /// Flush and close the connection. Idempotent.
    pub fn close(&self) { let _ = self.commands.send(Command::Close); }

    /// Close immediately. With an error the close counts as failed and the
    /// error is reported to the error hook. Idempotent.
    pub fn terminate(&self, error: Option<Error>) {
        let _ = self.commands.send(Command::Terminate(error));
    }

    /// Wait until the connection is closed.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // A dropped actor also means closed.
        let _ = state
            .wait_for(|state| *state == ConnectionState::Closed)
            .await;
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState { *self.state.borrow() }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.state() == ConnectionState::Closed }

    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { self.local_addr }

    #[must_use]
    pub const fn peer_addr(&self) -> Option<SocketAddr> { self.peer_addr }
}
