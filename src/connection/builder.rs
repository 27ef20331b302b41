//! Outbound connection establishment.

use std::{net::SocketAddr, time::Duration};

use tokio::net::TcpSocket;

use super::{Connection, ConnectionHooks, HandlerError, SocketOptions};
use crate::{
    config::ConnectionConfig,
    error::Error,
    frame::{Meta, Value},
    reply::Replies,
};

/// Configures and dials an outbound [`Connection`].
#[derive(Clone, Debug, Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    socket_options: SocketOptions,
    hooks: ConnectionHooks,
}

impl ConnectionBuilder {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replace the whole connection configuration.
    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.config = self.config.max_frame_size(bytes);
        self
    }

    #[must_use]
    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config = self.config.send_timeout(timeout);
        self
    }

    #[must_use]
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config = self.config.idle_timeout(timeout);
        self
    }

    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.socket_options = options;
        self
    }

    /// Replace all hooks at once.
    #[must_use]
    pub fn hooks(mut self, hooks: ConnectionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// See [`ConnectionHooks::on_data`].
    #[must_use]
    pub fn on_data<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value, &Meta, &mut Replies) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_data(handler);
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_error(handler);
        self
    }

    #[must_use]
    pub fn on_close<F>(mut self, handler: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_close(handler);
        self
    }

    /// Dial `addr` and spawn the connection actor on the current runtime.
    ///
    /// A panic inside the actor, for example from a data handler, is logged
    /// and rejects the connection's pending sends.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings and an I/O error
    /// when socket setup or the connect fails.
    pub async fn connect(self, addr: SocketAddr) -> Result<Connection, Error> {
        let config = self.config.validated()?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        self.socket_options.apply(&socket)?;
        let stream = socket.connect(addr).await?;
        let (connection, actor) = Connection::from_tcp(stream, self.hooks, config);
        tokio::spawn(actor.run_supervised());
        Ok(connection)
    }
}
