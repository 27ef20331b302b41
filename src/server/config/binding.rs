//! Listener binding for [`Server`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::net::TcpListener;

use crate::server::{Bound, HooksFactory, Server, ServerError, ServerState, Unbound};

impl<F, S> Server<F, S>
where
    F: HooksFactory,
    S: ServerState,
{
    fn bind_to_listener(self, std_listener: StdTcpListener) -> Result<Server<F, Bound>, ServerError> {
        let Server {
            factory,
            workers,
            config,
            on_connection,
            ready_tx,
            ..
        } = self;
        config.connection_config().validated()?;

        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let tokio_listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;

        Ok(Server {
            factory,
            workers,
            config,
            on_connection,
            ready_tx,
            state: Bound {
                listener: Arc::new(tokio_listener),
            },
        })
    }

    /// Bind to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for an unusable configuration and
    /// [`ServerError::Bind`] when the socket cannot be bound.
    pub fn bind(self, addr: SocketAddr) -> Result<Server<F, Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_to_listener(std_listener)
    }

    /// Bind to the host and port of the current [`ServerConfig`](super::ServerConfig).
    ///
    /// # Errors
    ///
    /// See [`Server::bind`].
    pub fn bind_configured(self) -> Result<Server<F, Bound>, ServerError> {
        let addr = self.config.socket_addr();
        self.bind(addr)
    }

    /// Adopt an already bound standard library listener.
    ///
    /// # Errors
    ///
    /// See [`Server::bind`].
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<Server<F, Bound>, ServerError> {
        self.bind_to_listener(std_listener)
    }
}

impl<F> Server<F, Unbound>
where
    F: HooksFactory,
{
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }
}

impl<F> Server<F, Bound>
where
    F: HooksFactory,
{
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}
