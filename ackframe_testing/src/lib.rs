//! Utilities for exercising `ackframe` connections in tests.
//!
//! The helpers wire connections over `tokio::io::duplex` streams, build raw
//! frame bytes for scripted peers and capture `log` output.
//!
//! ```rust
//! use ackframe::{ConnectionHooks, Value};
//! use ackframe_testing::connection_pair;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (client, _server) = connection_pair(ConnectionHooks::new(), ConnectionHooks::new());
//! let response = client.send("ping").await.expect("acked");
//! assert_eq!(response.value, Value::Null);
//! # }
//! ```

pub mod frames;
pub mod logging;
pub mod pair;

pub use frames::{ack_bytes, chunked, frame_bytes, nak_bytes, request_bytes};
pub use logging::{LoggerHandle, logger};
pub use pair::{RawPeer, connection_pair, connection_pair_with, echo_hooks, raw_peer, unused_listener};
