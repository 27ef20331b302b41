//! Per-connection settings.

use std::time::Duration;

use crate::{buffer::DEFAULT_MAX_FRAME_SIZE, error::Error, frame::HEADER_LENGTH};

/// Limits and timers applied to one connection.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ackframe::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .max_frame_size(64 * 1024)
///     .send_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.max_frame_size_limit(), 64 * 1024);
/// assert_eq!(config.default_send_timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    max_frame_size: usize,
    idle_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            idle_timeout: None,
            send_timeout: None,
        }
    }
}

impl ConnectionConfig {
    /// Largest declared frame length accepted from the peer.
    #[must_use]
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Terminate the connection when no byte arrives within `timeout` of it
    /// starting. The timer is cleared by the first byte received.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Timeout applied by [`Connection::send`](crate::Connection::send).
    #[must_use]
    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_frame_size_limit(&self) -> usize { self.max_frame_size }

    #[must_use]
    pub const fn idle_timeout_limit(&self) -> Option<Duration> { self.idle_timeout }

    #[must_use]
    pub const fn default_send_timeout(&self) -> Option<Duration> { self.send_timeout }

    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the frame size limit cannot hold a
    /// header.
    pub fn validated(self) -> Result<Self, Error> {
        if self.max_frame_size < HEADER_LENGTH {
            return Err(Error::config(format!(
                "max_frame_size must be at least {HEADER_LENGTH} bytes, got {}",
                self.max_frame_size
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_allow_128_kib_frames() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_frame_size_limit(), 128 * 1024);
        assert_eq!(config.idle_timeout_limit(), None);
        assert_eq!(config.default_send_timeout(), None);
    }

    #[rstest]
    #[case(0)]
    #[case(23)]
    fn tiny_frame_limits_are_rejected(#[case] size: usize) {
        let err = ConnectionConfig::default()
            .max_frame_size(size)
            .validated()
            .expect_err("too small");
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
