//! Messages from [`Connection`](super::Connection) handles to the actor.

use std::time::Duration;

use bytes::Bytes;

use crate::{error::Error, frame::PayloadType, pending::Responder};

pub(super) enum Command {
    /// Send an already encoded value and report its ACK or NAK.
    Send {
        payload_type: PayloadType,
        payload: Bytes,
        timeout: Option<Duration>,
        responder: Responder,
    },
    /// Stop reading from the transport.
    Pause,
    Resume,
    /// Flush and close without error.
    Close,
    /// Close immediately, optionally reporting `Error` to the error hook.
    Terminate(Option<Error>),
}
