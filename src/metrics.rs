//! Metric helpers for `ackframe`.
//!
//! Thin wrappers over the [`metrics`](https://docs.rs/metrics) facade. With
//! the `metrics` feature disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

use crate::error::ErrorKind;

/// Name of the gauge tracking active connections.
pub const CONNECTIONS_ACTIVE: &str = "ackframe_connections_active";
/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "ackframe_frames_processed_total";
/// Name of the counter tracking connection errors, labelled by kind.
pub const ERRORS_TOTAL: &str = "ackframe_errors_total";
/// Name of the counter tracking ACKs and NAKs that arrived too late.
pub const LAGGED_RESPONSES: &str = "ackframe_lagged_responses_total";
/// Name of the counter tracking panicking connection tasks.
pub const CONNECTION_PANICS: &str = "ackframe_connection_panics_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames read from the peer.
    Inbound,
    /// Frames written to the peer.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "only used as a label"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error surfaced on a connection.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.name()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record an ACK or NAK for a request that was no longer pending.
pub fn inc_lagged() {
    #[cfg(feature = "metrics")]
    counter!(LAGGED_RESPONSES).increment(1);
}

/// Record a connection task that panicked.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}
