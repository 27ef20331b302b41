//! Runtime control for [`Server`].

mod accept;
mod backoff;
#[cfg(test)]
mod tests;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::warn;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, HooksFactory, Server, ServerError, connection::ConnectionSetup};

impl<F> Server<F, Bound>
where
    F: HooksFactory,
{
    /// Run the server until a Ctrl-C signal is received.
    ///
    /// # Errors
    ///
    /// Currently always `Ok`; accept errors are retried with back-off.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until `shutdown` completes.
    ///
    /// On shutdown the workers stop accepting, live connections are closed
    /// gracefully and this waits for every connection task to finish.
    ///
    /// # Errors
    ///
    /// Currently always `Ok`; accept errors are retried with back-off.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let Server {
            factory,
            workers,
            config,
            on_connection,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let setup = ConnectionSetup {
            config: config.connection_config(),
            on_connection,
            shutdown: shutdown_token.clone(),
        };

        for _ in 0..workers {
            tracker.spawn(accept_loop(
                Arc::clone(&listener),
                factory.clone(),
                AcceptLoopOptions {
                    setup: setup.clone(),
                    tracker: tracker.clone(),
                    backoff: config.backoff,
                },
            ));
        }

        // Signal readiness after all workers have been spawned.
        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}
