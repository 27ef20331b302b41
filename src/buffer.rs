//! Receive-side byte accumulator.
//!
//! TCP hands over arbitrary slices of the byte stream. [`ReceiveBuffer`]
//! keeps whatever has arrived and yields complete frames once their declared
//! length is buffered, however the stream was fragmented or coalesced.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    error::Error,
    frame::{Frame, FrameHeader, HEADER_LENGTH},
};

/// Default upper bound on a frame's declared length.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 128 * 1024;

const READ_RESERVE: usize = 8 * 1024;

/// Result of a successful extraction attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// A complete frame.
    Frame(Frame),
    /// A header declaring a length above the limit. Its bytes are skipped as
    /// they arrive.
    Oversized(FrameHeader),
}

/// Growable buffer that reassembles frames from a byte stream.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buf: BytesMut,
    discard: usize,
    max_frame_size: usize,
}

impl Default for ReceiveBuffer {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_SIZE) }
}

impl ReceiveBuffer {
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(READ_RESERVE),
            discard: 0,
            max_frame_size: max_frame_size.max(HEADER_LENGTH),
        }
    }

    #[must_use]
    pub const fn max_frame_size(&self) -> usize { self.max_frame_size }

    /// Append a received chunk.
    pub fn append(&mut self, chunk: &[u8]) { self.buf.extend_from_slice(chunk); }

    /// Buffered bytes not yet consumed.
    #[must_use]
    pub fn peek(&self) -> &[u8] { &self.buf }

    /// Remove and return up to `n` bytes from the front.
    pub fn consume(&mut self, n: usize) -> Bytes { self.buf.split_to(n.min(self.buf.len())).freeze() }

    #[must_use]
    pub fn len(&self) -> usize { self.buf.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }

    /// Bytes of a rejected oversized frame still to be skipped.
    #[must_use]
    pub const fn pending_discard(&self) -> usize { self.discard }

    /// Read more bytes from `reader` straight into the buffer.
    ///
    /// Cancel safe: dropping the future before completion loses no data.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `reader`. `Ok(0)` signals end of stream.
    pub async fn read_from<R>(&mut self, reader: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        if self.buf.capacity() - self.buf.len() < READ_RESERVE {
            self.buf.reserve(READ_RESERVE);
        }
        reader.read_buf(&mut self.buf).await
    }

    /// Try to extract one frame.
    ///
    /// Idempotent while no complete frame is buffered: repeated calls return
    /// `Ok(None)` without consuming anything.
    ///
    /// # Errors
    ///
    /// Returns a header error when the magic or the declared length is
    /// invalid. The stream position is then unknown and the caller must stop
    /// reading.
    pub fn next_frame(&mut self) -> Result<Option<Inbound>, Error> {
        self.skip_discarded();
        if self.discard > 0 {
            return Ok(None);
        }
        let Some(header) = FrameHeader::peek(&self.buf)? else {
            return Ok(None);
        };
        let length = header.length as usize;
        if length > self.max_frame_size {
            self.discard = length;
            self.skip_discarded();
            return Ok(Some(Inbound::Oversized(header)));
        }
        if self.buf.len() < length {
            self.buf.reserve(length - self.buf.len());
            return Ok(None);
        }
        let mut bytes = self.buf.split_to(length);
        bytes.advance(HEADER_LENGTH);
        Ok(Some(Inbound::Frame(Frame {
            header,
            payload: bytes.freeze(),
        })))
    }

    fn skip_discarded(&mut self) {
        let skip = self.discard.min(self.buf.len());
        self.buf.advance(skip);
        self.discard -= skip;
    }
}
