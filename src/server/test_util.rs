//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use bytes::BytesMut;
use rstest::fixture;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use super::{Bound, HooksFactory, Server};
use crate::{
    buffer::{Inbound, ReceiveBuffer},
    connection::ConnectionHooks,
    frame::{Frame, Meta, Value},
    reply::Replies,
};

/// Hooks echoing every request back as the single reply.
#[fixture]
pub fn factory() -> impl HooksFactory {
    || {
        ConnectionHooks::new().on_data(|value: Value, _: &Meta, replies: &mut Replies| {
            replies.reply(value);
            Ok(())
        })
    }
}

/// Hooks whose data handler panics with "boom".
pub fn panicking_factory() -> ConnectionHooks {
    ConnectionHooks::new().on_data(|_: Value, _: &Meta, _: &mut Replies| panic!("boom"))
}

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

pub fn bind_server<F: HooksFactory>(factory: F, listener: StdTcpListener) -> Server<F, Bound> {
    Server::new(factory)
        .workers(1)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

/// TCP client speaking the wire format by hand.
pub struct RawClient {
    pub stream: TcpStream,
    buffer: ReceiveBuffer,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.expect("connect"),
            buffer: ReceiveBuffer::default(),
        }
    }

    pub fn local_addr(&self) -> SocketAddr { self.stream.local_addr().expect("local_addr") }

    pub async fn write_frame(&mut self, frame: &Frame) {
        let mut bytes = BytesMut::new();
        frame.header.write(&mut bytes);
        bytes.extend_from_slice(&frame.payload);
        self.stream.write_all(&bytes).await.expect("write frame");
    }

    pub async fn send_request(&mut self, sequence: u32, value: &Value) {
        let (payload_type, payload) = value.encode().expect("encode");
        let frame = Frame::message(sequence, 1.0, payload_type, payload).expect("frame");
        self.write_frame(&frame).await;
    }

    pub async fn ack(&mut self, sequence: u32, value: &Value) {
        let frame = Frame::ack(sequence, None, value).expect("ack");
        self.write_frame(&frame).await;
    }

    pub async fn read_frame(&mut self) -> Frame {
        loop {
            if let Some(Inbound::Frame(frame)) = self.buffer.next_frame().expect("valid frame") {
                return frame;
            }
            let n = self
                .buffer
                .read_from(&mut self.stream)
                .await
                .expect("read");
            assert_ne!(n, 0, "server closed before sending a frame");
        }
    }

    /// Read a request, returning its sequence and decoded value.
    pub async fn read_request(&mut self) -> (u32, Value) {
        let frame = self.read_frame().await;
        let value = Value::decode(frame.header.payload_type, frame.payload).expect("decode");
        (frame.header.sequence, value)
    }

    /// Whether the server has closed its side of the stream.
    pub async fn at_eof(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(self.stream.read(&mut byte).await, Ok(0) | Err(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[tokio::test]
    async fn bound_server_reports_listener_address(free_listener: StdTcpListener) {
        let expected = free_listener.local_addr().expect("listener address");
        let server = bind_server(factory(), free_listener);
        assert_eq!(server.local_addr(), Some(expected));
        assert_eq!(server.worker_count(), 1);
    }
}
