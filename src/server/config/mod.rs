//! Configuration for [`Server`].

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use tokio::sync::oneshot;

use super::{BackoffConfig, HooksFactory, Server, ServerState, Unbound};
use crate::{buffer::DEFAULT_MAX_FRAME_SIZE, config::ConnectionConfig, connection::Connection};

mod binding;

/// Idle window granted to a freshly accepted connection.
pub const DEFAULT_CONNECT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Listener address and the settings applied to every accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_frame_size: usize,
    /// Terminate accepted connections that stay silent this long. `None`
    /// disables the check.
    pub connect_idle_timeout: Option<Duration>,
    pub backoff: BackoffConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_idle_timeout: Some(DEFAULT_CONNECT_IDLE_TIMEOUT),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }

    /// Settings handed to each accepted connection's actor.
    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .max_frame_size(self.max_frame_size)
            .idle_timeout(self.connect_idle_timeout)
    }
}

impl<F> Server<F, Unbound>
where
    F: HooksFactory,
{
    /// Create a server producing connection hooks with `factory`.
    ///
    /// The worker count defaults to the number of available CPU cores (or 1
    /// if this cannot be determined).
    #[must_use]
    pub fn new(factory: F) -> Self {
        let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            factory,
            workers,
            config: ServerConfig::default(),
            on_connection: None,
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<F, S> Server<F, S>
where
    F: HooksFactory,
    S: ServerState,
{
    /// Set the number of accept workers, clamped to at least one.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    /// Replace the whole configuration. The address fields only matter for
    /// [`Server::bind_configured`].
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.config.max_frame_size = bytes;
        self
    }

    #[must_use]
    pub fn connect_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.connect_idle_timeout = timeout;
        self
    }

    /// Configure the delay between retries after accept errors.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Receive a handle to every accepted connection.
    ///
    /// The callback runs on the connection's task before its actor starts.
    #[must_use]
    pub fn on_connection<C>(mut self, callback: C) -> Self
    where
        C: Fn(Connection) + Send + Sync + 'static,
    {
        self.on_connection = Some(Arc::new(callback));
        self
    }

    /// Notify `tx` once the accept workers are running.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    #[inline]
    #[must_use]
    pub const fn worker_count(&self) -> usize { self.workers }

    #[must_use]
    pub const fn server_config(&self) -> &ServerConfig { &self.config }
}
