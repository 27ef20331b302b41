//! Panic payload formatting and connection task supervision.

use std::{any::Any, fmt, future::Future, net::SocketAddr, panic::AssertUnwindSafe};

use futures::FutureExt;
use log::error;

/// Displays a panic payload.
///
/// `String` and `&'static str` payloads print verbatim; anything else falls
/// back to `Debug`.
///
/// ```
/// use ackframe::panic::format_panic;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(format_panic(payload.as_ref()).to_string(), "boom");
/// let payload: Box<dyn std::any::Any + Send> = Box::new(5_u32);
/// assert!(format_panic(payload.as_ref()).to_string().contains("Any"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Wrap a panic payload for display.
pub fn format_panic(payload: &(dyn Any + Send)) -> PanicMessage<'_> { PanicMessage(payload) }

/// Drive a connection task, logging instead of propagating a panic.
pub(crate) async fn supervise<F>(task: F, peer_addr: Option<SocketAddr>)
where
    F: Future<Output = ()>,
{
    if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
        crate::metrics::inc_connection_panics();
        let panic_msg = format_panic(panic.as_ref());
        // Emit via both `log` and `tracing` for tests that capture either.
        error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
        tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
    }
}
