//! Per-connection callbacks.
//!
//! Hooks are owned by the connection actor and dropped with it. Error and
//! close hooks are synchronous and run on the actor task, so they must not
//! block.

use std::{fmt, sync::Arc};

use crate::{
    error::{Error, ErrorKind},
    frame::{Meta, Value},
    reply::Replies,
};

/// Error type data handlers may return. An [`Error`] is sent back verbatim;
/// anything else becomes a remote runtime error carrying its message.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback receiving every inbound application message.
pub type DataHandler =
    Arc<dyn Fn(Value, &Meta, &mut Replies) -> Result<(), HandlerError> + Send + Sync>;

/// Callback receiving connection-level errors.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Callback invoked once when the connection closes, with `had_error`.
pub type CloseHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Callbacks attached to one connection.
///
/// # Examples
///
/// ```
/// use ackframe::{ConnectionHooks, Meta, Replies, Value};
///
/// let hooks = ConnectionHooks::new()
///     .on_data(|value: Value, _meta: &Meta, replies: &mut Replies| {
///         replies.reply(value);
///         Ok(())
///     })
///     .on_close(|had_error| println!("closed, had_error={had_error}"));
/// # drop(hooks);
/// ```
#[derive(Clone, Default)]
pub struct ConnectionHooks {
    on_data: Option<DataHandler>,
    on_error: Option<ErrorHandler>,
    on_close: Option<CloseHandler>,
}

impl fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("on_data", &self.on_data.as_ref().map(|_| "<handler>"))
            .field("on_error", &self.on_error.as_ref().map(|_| "<handler>"))
            .field("on_close", &self.on_close.as_ref().map(|_| "<handler>"))
            .finish()
    }
}

impl ConnectionHooks {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Handle inbound messages. Without a handler every message is
    /// acknowledged with an empty payload.
    #[must_use]
    pub fn on_data<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value, &Meta, &mut Replies) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on_data = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn on_close<F>(mut self, handler: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(handler));
        self
    }

    pub(crate) fn handle_data(
        &self,
        value: Value,
        meta: &Meta,
        replies: &mut Replies,
    ) -> Result<(), Error> {
        let Some(handler) = &self.on_data else {
            return Ok(());
        };
        handler(value, meta, replies).map_err(|err| match err.downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Error::new(ErrorKind::RemoteRuntime, other.to_string()),
        })
    }

    pub(crate) fn emit_error(&self, err: &Error) {
        if let Some(handler) = &self.on_error {
            handler(err);
        }
    }

    pub(crate) fn emit_close(&self, had_error: bool) {
        if let Some(handler) = &self.on_close {
            handler(had_error);
        }
    }
}
