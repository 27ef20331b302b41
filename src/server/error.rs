//! Errors raised by [`Server`](super::Server) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while binding or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listener failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
    /// The configuration cannot produce usable connections.
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::error::Error),
}
