//! Accept loop shared by the server's workers.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::task::TaskTracker;

use super::backoff::BackoffConfig;
use crate::server::{
    HooksFactory,
    connection::{ConnectionSetup, spawn_connection_task},
};

/// Source of inbound streams, abstracted so tests can inject failures.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

pub(in crate::server) struct AcceptLoopOptions {
    pub setup: ConnectionSetup,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accept connections until the shutdown token in `options` is cancelled.
///
/// Accept errors are logged and retried after an exponentially growing
/// delay; a successful accept resets the delay.
pub(in crate::server) async fn accept_loop<F, L>(
    listener: Arc<L>,
    factory: F,
    options: AcceptLoopOptions,
) where
    F: HooksFactory,
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions {
        setup,
        tracker,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let options = AcceptLoopOptions {
        setup,
        tracker,
        backoff,
    };
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(&listener, &factory, &options, delay).await {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration<F, L>(
    listener: &Arc<L>,
    factory: &F,
    options: &AcceptLoopOptions,
    delay: Duration,
) -> Option<Duration>
where
    F: HooksFactory,
    L: AcceptListener + 'static,
{
    select! {
        biased;

        () = options.setup.shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, _)) => {
                spawn_connection_task(
                    stream,
                    factory.clone(),
                    options.setup.clone(),
                    &options.tracker,
                );
                options.backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                sleep(delay).await;
                options.backoff.next_delay(delay)
            }
        }),
    }
}
