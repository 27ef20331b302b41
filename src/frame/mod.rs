//! Frame model: header, typed payload values and per-frame metadata.

mod header;
mod value;

use bytes::Bytes;
pub use header::{FrameFlags, FrameHeader, FrameKind, HEADER_LENGTH, MAGIC};
pub use value::{Number, PayloadType, Value};

use crate::error::{Error, ErrorKind};

/// A complete frame: decoded header plus raw payload bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Assemble a frame, computing the length field.
    ///
    /// # Errors
    ///
    /// Returns an encode error when the frame would not fit the 32-bit
    /// length field.
    pub fn new(
        sequence: u32,
        timestamp: Option<f64>,
        flags: FrameFlags,
        payload_type: PayloadType,
        payload: Bytes,
    ) -> Result<Self, Error> {
        let length = HEADER_LENGTH
            .checked_add(payload.len())
            .and_then(|len| u32::try_from(len).ok())
            .ok_or_else(|| Error::new(ErrorKind::Encode, "Frame too long"))?;
        let flags = match timestamp {
            Some(_) => flags | FrameFlags::HAS_TIMESTAMP,
            None => flags,
        };
        Ok(Self {
            header: FrameHeader {
                length,
                sequence,
                timestamp: timestamp.unwrap_or(0.0),
                flags,
                payload_type: payload_type.tag(),
            },
            payload,
        })
    }

    /// Application request frame.
    ///
    /// # Errors
    ///
    /// See [`Frame::new`].
    pub fn message(
        sequence: u32,
        timestamp: f64,
        payload_type: PayloadType,
        payload: Bytes,
    ) -> Result<Self, Error> {
        Self::new(
            sequence,
            Some(timestamp),
            FrameFlags::empty(),
            payload_type,
            payload,
        )
    }

    /// Acknowledgement echoing the request's sequence and timestamp.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be encoded or is too large.
    pub fn ack(sequence: u32, timestamp: Option<f64>, value: &Value) -> Result<Self, Error> {
        let (payload_type, payload) = value.encode()?;
        Self::new(sequence, timestamp, FrameFlags::ACK, payload_type, payload)
    }

    /// Negative acknowledgement carrying `error` in its wire form.
    ///
    /// # Errors
    ///
    /// Fails only when the serialized error exceeds the length field.
    pub fn nak(sequence: u32, timestamp: Option<f64>, error: &Error) -> Result<Self, Error> {
        let payload = Bytes::from(error.to_json().to_string());
        Self::new(
            sequence,
            timestamp,
            FrameFlags::NAK,
            PayloadType::Object,
            payload,
        )
    }

    #[must_use]
    pub fn meta(&self) -> Meta { Meta::from(&self.header) }
}

/// Metadata of a received frame, handed to data handlers and attached to
/// every [`Response`](crate::Response).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Meta {
    pub sequence: u32,
    pub timestamp: Option<f64>,
    /// Total frame length including the header.
    pub length: u32,
}

impl From<&FrameHeader> for Meta {
    fn from(header: &FrameHeader) -> Self {
        Self {
            sequence: header.sequence,
            timestamp: header.timestamp(),
            length: header.length,
        }
    }
}

#[cfg(test)]
mod tests;
