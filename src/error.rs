//! Error type shared by every `ackframe` operation.
//!
//! A single [`Error`] carries an [`ErrorKind`], a human readable message and
//! an open bag of JSON fields. The same value travels over the wire inside a
//! NAK payload as `{"isError": true, "name": ..., "message": ..., ...fields}`
//! and is rebuilt on the receiving side with [`Error::from_json`].

use std::{fmt, io};

use serde_json::{Map, Value as Json};

/// Code attached to header errors caused by a magic mismatch.
pub const CODE_BAD_HEADER: &str = "EBADHEADER";
/// Code attached to header errors caused by a declared length below the header size.
pub const CODE_BAD_LENGTH: &str = "EBADLENGTH";
/// Code attached to header errors caused by a frame with both ACK and NAK set.
pub const CODE_BAD_FLAGS: &str = "EBADFLAGS";
/// Code attached to header errors raised for frames above the size limit.
pub const CODE_FRAME_TOO_LONG: &str = "EFRAMETOOLONG";

/// Category of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid configuration supplied to a builder.
    Config,
    /// The stream carried a malformed or unacceptable frame header.
    Header,
    /// A local value could not be encoded for sending.
    Encode,
    /// An ACK or NAK payload could not be decoded.
    Decode,
    /// The peer could not decode a request we sent.
    RemoteDecode,
    /// The peer could not encode its reply.
    RemoteEncode,
    /// The peer's handler failed or requested a NAK.
    RemoteRuntime,
    /// No ACK or NAK arrived before the send timeout elapsed.
    Timeout,
    /// An ACK or NAK arrived for a request that is no longer pending.
    Lag,
    /// The connection closed before the request completed.
    Closed,
    /// The peer stayed silent past the idle window.
    Idle,
    /// The transport failed.
    Io,
    /// An error reported by the peer under a name this crate does not know.
    Remote,
}

impl ErrorKind {
    /// Wire name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Config => "ConfigError",
            Self::Header => "HeaderError",
            Self::Encode => "EncodeError",
            Self::Decode => "DecodeError",
            Self::RemoteDecode => "RemoteDecodeError",
            Self::RemoteEncode => "RemoteEncodeError",
            Self::RemoteRuntime => "RemoteRuntimeError",
            Self::Timeout => "TimeoutError",
            Self::Lag => "LagError",
            Self::Closed => "ClosedError",
            Self::Idle => "IdleError",
            Self::Io => "IoError",
            Self::Remote => "Error",
        }
    }

    /// Resolve a wire name, falling back to [`ErrorKind::Remote`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "ConfigError" => Self::Config,
            "HeaderError" => Self::Header,
            "EncodeError" => Self::Encode,
            "DecodeError" => Self::Decode,
            "RemoteDecodeError" => Self::RemoteDecode,
            "RemoteEncodeError" => Self::RemoteEncode,
            "RemoteRuntimeError" => Self::RemoteRuntime,
            "TimeoutError" => Self::Timeout,
            "LagError" => Self::Lag,
            "ClosedError" => Self::Closed,
            "IdleError" => Self::Idle,
            "IoError" => Self::Io,
            _ => Self::Remote,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Error raised by connections, codecs and reply aggregation.
///
/// # Examples
///
/// ```
/// use ackframe::{Error, ErrorKind};
///
/// let err = Error::new(ErrorKind::RemoteRuntime, "boom").with_field("code", "EBOOM");
/// assert_eq!(err.to_string(), "RemoteRuntimeError: boom");
/// assert_eq!(err.code(), Some("EBOOM"));
/// ```
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct Error {
    kind: ErrorKind,
    name: String,
    message: String,
    fields: Map<String, Json>,
}

impl Error {
    /// Create an error of `kind` with `message` and no fields.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.name().to_owned(),
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Attach a field, replacing any previous value under `key`.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Json>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// Attach a field only when `key` is not already present.
    #[must_use]
    pub(crate) fn with_default_field(mut self, key: &str, value: impl Into<Json>) -> Self {
        self.fields.entry(key.to_owned()).or_insert_with(|| value.into());
        self
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind { self.kind }

    /// Wire name. Matches [`ErrorKind::name`] except for
    /// [`ErrorKind::Remote`], which keeps the name the peer sent.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Json> { self.fields.get(key) }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Json> { &self.fields }

    /// The `code` field, if it holds a string.
    #[must_use]
    pub fn code(&self) -> Option<&str> { self.field("code").and_then(Json::as_str) }

    /// Whether this error leaves the byte stream in an unknown position.
    ///
    /// A bad magic or an impossible declared length means frame boundaries
    /// can no longer be found, so the connection must be torn down. Other
    /// errors only affect a single frame or request.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        self.kind == ErrorKind::Header
            && matches!(self.code(), Some(CODE_BAD_HEADER | CODE_BAD_LENGTH))
    }

    /// Serialize into the NAK wire form.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let mut map = Map::with_capacity(self.fields.len() + 3);
        map.insert("isError".into(), Json::Bool(true));
        map.insert("name".into(), Json::String(self.name.clone()));
        map.insert("message".into(), Json::String(self.message.clone()));
        for (key, value) in &self.fields {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Json::Object(map)
    }

    /// Whether `value` is a serialized error produced by [`Error::to_json`].
    #[must_use]
    pub fn is_error_json(value: &Json) -> bool {
        value.get("isError").and_then(Json::as_bool) == Some(true)
    }

    /// Rebuild an error from its wire form.
    ///
    /// Returns `None` unless `value` is an object flagged with `isError`.
    /// Unknown names map to [`ErrorKind::Remote`] and a missing message
    /// defaults to `"Nak"`.
    #[must_use]
    pub fn from_json(value: &Json) -> Option<Self> {
        if !Self::is_error_json(value) {
            return None;
        }
        let map = value.as_object()?;
        let name = map.get("name").and_then(Json::as_str).unwrap_or("Error");
        let message = map.get("message").and_then(Json::as_str).unwrap_or("Nak");
        let fields = map
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "isError" | "name" | "message"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Self {
            kind: ErrorKind::from_name(name),
            name: name.to_owned(),
            message: message.to_owned(),
            fields,
        })
    }

    /// Rebuild an error from a NAK payload of any shape.
    pub(crate) fn from_nak_payload(value: &Json) -> Self {
        Self::from_json(value).unwrap_or_else(|| Self::new(ErrorKind::Remote, "Nak"))
    }

    pub(crate) fn bad_header() -> Self {
        Self::new(ErrorKind::Header, "Bad header").with_field("code", CODE_BAD_HEADER)
    }

    pub(crate) fn bad_length(length: u32) -> Self {
        Self::new(ErrorKind::Header, "Bad header")
            .with_field("code", CODE_BAD_LENGTH)
            .with_field("length", length)
    }

    pub(crate) fn bad_flags(sequence: u32) -> Self {
        Self::new(ErrorKind::Header, "Ack and nak both set")
            .with_field("code", CODE_BAD_FLAGS)
            .with_field("sequence", sequence)
    }

    pub(crate) fn frame_too_long(length: u32, max: usize) -> Self {
        Self::new(ErrorKind::Header, "Frame too long")
            .with_field("code", CODE_FRAME_TOO_LONG)
            .with_field("length", length)
            .with_field("max", max)
    }

    pub(crate) fn timeout(sequence: u32, sent_at: f64) -> Self {
        Self::new(ErrorKind::Timeout, "Ack timeout")
            .with_field("sequence", sequence)
            .with_field("sentAt", sent_at)
    }

    pub(crate) fn lag(frame_type: &str, sequence: u32, timestamp: Option<f64>) -> Self {
        Self::new(ErrorKind::Lag, "Response after timeout")
            .with_field("type", frame_type)
            .with_field("sequence", sequence)
            .with_field("timestamp", timestamp)
    }

    pub(crate) fn closed_pending(sequence: u32, sent_at: f64, had_error: bool) -> Self {
        Self::new(ErrorKind::Closed, "Closed while awaiting ack")
            .with_field("sequence", sequence)
            .with_field("sentAt", sent_at)
            .with_field("hadError", had_error)
    }

    pub(crate) fn cannot_write() -> Self { Self::new(ErrorKind::Closed, "Cannot write") }

    pub(crate) fn idle() -> Self { Self::new(ErrorKind::Idle, "Inactivity on connect") }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string()).with_field("code", format!("{:?}", err.kind()))
    }
}
