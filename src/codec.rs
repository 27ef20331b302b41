//! Outbound frame encoder.
//!
//! Inbound bytes go through [`ReceiveBuffer`](crate::buffer::ReceiveBuffer)
//! instead of a `Decoder` so the buffer can be inspected and partially
//! skipped when an oversized frame arrives.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::frame::Frame;

/// Writes frames as header followed by payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec;

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(frame.header.length as usize);
        frame.header.write(dst);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}
