//! Fixed 24-byte frame header.
//!
//! ```text
//!  0      2        6          10              18     19     20         24
//!  +------+--------+----------+---------------+------+------+----------+
//!  | A5 5A| length | sequence | timestamp f64 | flag | type | reserved |
//!  +------+--------+----------+---------------+------+------+----------+
//! ```
//!
//! All multi-byte fields are big-endian. `length` covers the header and the
//! payload.

use std::ops::BitOr;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;

/// Constant prefix of every frame.
pub const MAGIC: [u8; 2] = [0xA5, 0x5A];

/// Size of the encoded header in bytes.
pub const HEADER_LENGTH: usize = 24;

/// Bit set carried in the header's flag byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// The frame acknowledges a request.
    pub const ACK: Self = Self(0b001);
    /// The frame rejects a request.
    pub const NAK: Self = Self(0b010);
    /// The timestamp field is meaningful.
    pub const HAS_TIMESTAMP: Self = Self(0b100);

    #[must_use]
    pub const fn empty() -> Self { Self(0) }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self { Self(bits) }

    #[must_use]
    pub const fn bits(self) -> u8 { self.0 }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

/// Role of a frame derived from its ACK and NAK flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Application request expecting an ACK or NAK.
    Message,
    /// Positive reply.
    Ack,
    /// Negative reply.
    Nak,
}

impl FrameKind {
    /// Label used in lag errors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Ack => "ACK",
            Self::Nak => "NAK",
        }
    }
}

/// Decoded frame header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameHeader {
    /// Total frame length including this header.
    pub length: u32,
    pub sequence: u32,
    /// Milliseconds since the Unix epoch, valid when [`FrameFlags::HAS_TIMESTAMP`] is set.
    pub timestamp: f64,
    pub flags: FrameFlags,
    /// Raw payload type tag; unknown tags are rejected when the payload is decoded.
    pub payload_type: u8,
}

impl FrameHeader {
    /// Write the encoded header to `dst`.
    pub fn write(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_LENGTH);
        dst.put_slice(&MAGIC);
        dst.put_u32(self.length);
        dst.put_u32(self.sequence);
        dst.put_f64(self.timestamp);
        dst.put_u8(self.flags.bits());
        dst.put_u8(self.payload_type);
        dst.put_u32(0);
    }

    /// Decode a header from the front of `src` without consuming it.
    ///
    /// Returns `Ok(None)` while fewer than [`HEADER_LENGTH`] bytes are
    /// available.
    ///
    /// # Errors
    ///
    /// Returns a header error when the magic does not match or the declared
    /// length is shorter than the header itself. Both leave the stream
    /// position unknown.
    pub fn peek(src: &[u8]) -> Result<Option<Self>, Error> {
        let Some(mut buf) = src.get(..HEADER_LENGTH) else {
            return Ok(None);
        };
        if buf[..MAGIC.len()] != MAGIC {
            return Err(Error::bad_header());
        }
        buf.advance(MAGIC.len());
        let length = buf.get_u32();
        if (length as usize) < HEADER_LENGTH {
            return Err(Error::bad_length(length));
        }
        let sequence = buf.get_u32();
        let timestamp = buf.get_f64();
        let flags = FrameFlags::from_bits(buf.get_u8());
        let payload_type = buf.get_u8();
        Ok(Some(Self {
            length,
            sequence,
            timestamp,
            flags,
            payload_type,
        }))
    }

    /// Classify the frame from its flags.
    ///
    /// # Errors
    ///
    /// Returns a header error when both ACK and NAK are set. Only this frame
    /// is affected; the stream stays in sync.
    pub fn kind(&self) -> Result<FrameKind, Error> {
        match (
            self.flags.contains(FrameFlags::ACK),
            self.flags.contains(FrameFlags::NAK),
        ) {
            (false, false) => Ok(FrameKind::Message),
            (true, false) => Ok(FrameKind::Ack),
            (false, true) => Ok(FrameKind::Nak),
            (true, true) => Err(Error::bad_flags(self.sequence)),
        }
    }

    /// The timestamp when [`FrameFlags::HAS_TIMESTAMP`] is set.
    #[must_use]
    pub fn timestamp(&self) -> Option<f64> {
        self.flags
            .contains(FrameFlags::HAS_TIMESTAMP)
            .then_some(self.timestamp)
    }

    /// Number of payload bytes following the header.
    #[must_use]
    pub fn payload_length(&self) -> usize { (self.length as usize).saturating_sub(HEADER_LENGTH) }
}
