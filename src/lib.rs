#![doc(html_root_url = "https://docs.rs/ackframe/latest")]
//! Acknowledged request/reply framing over TCP.
//!
//! Every message travels in a frame with a fixed 24-byte header carrying a
//! sequence number. The receiver answers each request with exactly one ACK
//! or NAK frame echoing that sequence, so a [`Connection::send`] resolves to
//! the peer's reply, a remote error, a timeout or a close notification.
//! Inbound requests reach the connection's data handler together with a
//! [`Replies`] collector whose outcomes are merged into the single reply.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod panic;
pub mod pending;
pub mod reply;
pub mod response;
pub mod server;

pub use config::ConnectionConfig;
pub use connection::{
    Connection,
    ConnectionActor,
    ConnectionBuilder,
    ConnectionHooks,
    ConnectionState,
    HandlerError,
    SocketOptions,
};
pub use error::{Error, ErrorKind};
pub use frame::{Frame, FrameFlags, FrameHeader, FrameKind, Meta, Number, PayloadType, Value};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED};
pub use reply::{Outcome, Replies, Settled, Tag};
pub use response::Response;
