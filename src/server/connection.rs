//! Connection handling for [`Server`](super::Server).

use std::net::SocketAddr;

use log::warn;
use tokio::{net::TcpStream, select};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{ConnectionCallback, HooksFactory};
use crate::{config::ConnectionConfig, connection::Connection};

/// Settings shared by every connection a worker accepts.
#[derive(Clone)]
pub(super) struct ConnectionSetup {
    pub config: ConnectionConfig,
    pub on_connection: Option<ConnectionCallback>,
    pub shutdown: CancellationToken,
}

/// Spawn a task to drive a single TCP connection, logging and discarding any
/// panics.
pub(super) fn spawn_connection_task<F>(
    stream: TcpStream,
    factory: F,
    setup: ConnectionSetup,
    tracker: &TaskTracker,
) where
    F: HooksFactory,
{
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Failed to retrieve peer address: error={e}");
            None
        }
    };
    tracker.spawn(crate::panic::supervise(
        process_stream(stream, peer_addr, factory, setup),
        peer_addr,
    ));
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn process_stream<F>(
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    factory: F,
    setup: ConnectionSetup,
) where
    F: HooksFactory,
{
    let ConnectionSetup {
        config,
        on_connection,
        shutdown,
    } = setup;
    let (connection, actor) = Connection::from_tcp(stream, factory(), config);
    if let Some(callback) = on_connection {
        callback(connection.clone());
    }
    tracing::debug!(?peer_addr, "accepted connection");

    let run = actor.run();
    tokio::pin!(run);
    select! {
        biased;

        () = &mut run => {}
        () = shutdown.cancelled() => {
            connection.close();
            run.await;
        }
    }
}
