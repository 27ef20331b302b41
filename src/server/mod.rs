//! Tokio-based listener handing accepted streams to [`Connection`] actors.
//!
//! [`Server`] spawns worker tasks that share one TCP listener. Each accepted
//! stream becomes a connection whose hooks come from the server's factory
//! closure; the optional `on_connection` callback receives the handle so the
//! application can send requests of its own.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::connection::{Connection, ConnectionHooks};

/// Produces the hooks for each accepted connection.
pub trait HooksFactory: Fn() -> ConnectionHooks + Send + Sync + Clone + 'static {}

impl<F> HooksFactory for F where F: Fn() -> ConnectionHooks + Send + Sync + Clone + 'static {}

/// Callback receiving a handle to every accepted connection.
pub type ConnectionCallback = Arc<dyn Fn(Connection) + Send + Sync + 'static>;

/// Listener accepting ackframe connections.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// or [`Bound`]. New servers start `Unbound` and must call
/// [`Server::bind`], [`Server::bind_configured`] or
/// [`Server::bind_existing_listener`] before running.
///
/// # Examples
///
/// ```no_run
/// use ackframe::{ConnectionHooks, Meta, Replies, Value, server::Server};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ackframe::server::error::ServerError> {
/// let server = Server::new(|| {
///     ConnectionHooks::new().on_data(|value: Value, _: &Meta, replies: &mut Replies| {
///         replies.reply(value);
///         Ok(())
///     })
/// })
/// .bind("127.0.0.1:6543".parse().expect("address"))?;
/// server.run().await
/// # }
/// ```
pub struct Server<F, S = Unbound>
where
    F: HooksFactory,
    S: ServerState,
{
    pub(crate) factory: F,
    pub(crate) workers: usize,
    pub(crate) config: ServerConfig,
    pub(crate) on_connection: Option<ConnectionCallback>,
    /// Single-use readiness notification, sent once all workers run.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
pub use config::{DEFAULT_CONNECT_IDLE_TIMEOUT, ServerConfig};
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
