//! Connection actor.
//!
//! One actor task owns the stream, the receive buffer, the pending request
//! table and every in-flight reply aggregation of a connection. Outbound
//! frames are queued for a dedicated writer task, so reading continues while
//! a slow peer drains its output.
//!
//! The actor multiplexes its inputs with a `biased` `tokio::select!` loop in
//! this priority order: commands from [`Connection`](super::Connection)
//! handles, expired send timeouts, settled replies, writer failure, the idle
//! timer and finally socket reads. Timers are therefore always observed
//! before a late ACK read in the same turn.

use std::{io, net::SocketAddr, ops::ControlFlow, pin::Pin, time::Duration};

use bytes::Bytes;
use futures::{
    FutureExt,
    StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf},
    sync::{mpsc, watch},
    time::{Sleep, sleep},
};
use tracing::{debug, trace, warn};

use super::{
    ConnectionState,
    command::Command,
    counter::ActiveConnection,
    hooks::ConnectionHooks,
    writer::Writer,
};
use crate::{
    buffer::{Inbound, ReceiveBuffer},
    config::ConnectionConfig,
    error::{Error, ErrorKind},
    frame::{Frame, FrameHeader, FrameKind, Meta, PayloadType, Value},
    metrics::{self, Direction},
    pending::{PendingTable, Responder, now_millis},
    reply::{Replies, Settled},
    response::Response,
};

type ReplyFuture = BoxFuture<'static, SettledReply>;

/// Aggregated reply ready to be written back.
struct SettledReply {
    sequence: u32,
    timestamp: Option<f64>,
    settled: Settled,
}

enum Event {
    Command(Option<Command>),
    Expired(u32),
    Replied(SettledReply),
    WriteFailed(io::Error),
    IdleElapsed,
    Read(io::Result<usize>),
    /// No input can make progress any more.
    Stalled,
}

/// Drives one connection until it closes.
///
/// Obtained from [`Connection::from_stream`](super::Connection::from_stream)
/// or [`Connection::from_tcp`](super::Connection::from_tcp); spawn
/// [`ConnectionActor::run`] on a Tokio runtime.
pub struct ConnectionActor<S> {
    reader: ReadHalf<S>,
    /// Taken when [`ConnectionActor::run`] spawns the writer task.
    write_half: Option<WriteHalf<S>>,
    writer: Option<Writer>,
    buffer: ReceiveBuffer,
    pending: PendingTable,
    replies: FuturesUnordered<ReplyFuture>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    state: watch::Sender<ConnectionState>,
    hooks: ConnectionHooks,
    idle_timeout: Option<Duration>,
    idle: Option<Pin<Box<Sleep>>>,
    paused: bool,
    peer_addr: Option<SocketAddr>,
}

impl<S> ConnectionActor<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub(super) fn new(
        stream: S,
        hooks: ConnectionHooks,
        config: ConnectionConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<ConnectionState>,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader,
            write_half: Some(writer),
            writer: None,
            buffer: ReceiveBuffer::new(config.max_frame_size_limit()),
            pending: PendingTable::new(),
            replies: FuturesUnordered::new(),
            commands,
            commands_open: true,
            state,
            hooks,
            idle_timeout: config.idle_timeout_limit(),
            idle: None,
            paused: false,
            peer_addr,
        }
    }

    /// Run the connection until it closes.
    ///
    /// On exit every pending send is rejected, queued sends fail with
    /// "Cannot write" and the close hook runs once.
    pub async fn run(mut self) {
        let _active = ActiveConnection::new();
        self.writer = self.write_half.take().map(Writer::spawn);
        self.state.send_replace(ConnectionState::Open);
        self.idle = self.idle_timeout.map(|limit| Box::pin(sleep(limit)));
        debug!(peer_addr = ?self.peer_addr, "connection open");

        let had_error = loop {
            let event = self.next_event().await;
            if let ControlFlow::Break(had_error) = self.dispatch_event(event) {
                break had_error;
            }
        };
        self.shutdown(had_error).await;
    }

    /// Run the connection, logging a panic instead of propagating it.
    pub async fn run_supervised(self) {
        let peer_addr = self.peer_addr;
        crate::panic::supervise(self.run(), peer_addr).await;
    }

    /// Await the next ready event using biased priority ordering.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus operations internally"
    )]
    async fn next_event(&mut self) -> Event {
        let commands_open = self.commands_open;
        let timers_armed = self.pending.has_timers();
        let replies_waiting = !self.replies.is_empty();
        let writing = self.writer.is_some();
        let idle_armed = self.idle.is_some();
        let reading = !self.paused;

        tokio::select! {
            biased;

            command = self.commands.recv(), if commands_open => Event::Command(command),
            Some(sequence) = self.pending.next_expired(), if timers_armed => Event::Expired(sequence),
            Some(reply) = self.replies.next(), if replies_waiting => Event::Replied(reply),
            err = Self::writer_failed(self.writer.as_mut()), if writing => Event::WriteFailed(err),
            () = Self::idle_elapsed(self.idle.as_mut()), if idle_armed => Event::IdleElapsed,
            res = self.buffer.read_from(&mut self.reader), if reading => Event::Read(res),
            else => Event::Stalled,
        }
    }

    async fn idle_elapsed(idle: Option<&mut Pin<Box<Sleep>>>) {
        match idle {
            Some(timer) => timer.as_mut().await,
            None => std::future::pending().await,
        }
    }

    async fn writer_failed(writer: Option<&mut Writer>) -> io::Error {
        match writer {
            Some(writer) => writer.failed().await,
            None => std::future::pending().await,
        }
    }

    fn dispatch_event(&mut self, event: Event) -> ControlFlow<bool> {
        match event {
            Event::Command(Some(command)) => self.handle_command(command),
            Event::Command(None) => {
                // Handles are gone but the peer may still send requests.
                self.commands_open = false;
                ControlFlow::Continue(())
            }
            Event::Expired(sequence) => {
                if self.pending.expire(sequence) {
                    debug!(sequence, "ack timeout");
                }
                ControlFlow::Continue(())
            }
            Event::Replied(reply) => {
                self.write_reply(reply.sequence, reply.timestamp, reply.settled);
                ControlFlow::Continue(())
            }
            Event::WriteFailed(err) => {
                self.writer = None;
                self.emit_error(&Error::from(err));
                ControlFlow::Break(true)
            }
            Event::IdleElapsed => {
                self.emit_error(&Error::idle());
                ControlFlow::Break(true)
            }
            Event::Read(Ok(0)) => {
                debug!(peer_addr = ?self.peer_addr, "peer closed the stream");
                ControlFlow::Break(false)
            }
            Event::Read(Ok(_)) => {
                self.idle = None;
                self.process_buffer()
            }
            Event::Read(Err(err)) => {
                self.emit_error(&Error::from(err));
                ControlFlow::Break(true)
            }
            Event::Stalled => ControlFlow::Break(false),
        }
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<bool> {
        match command {
            Command::Send {
                payload_type,
                payload,
                timeout,
                responder,
            } => self.send_request(payload_type, payload, timeout, responder),
            Command::Pause => self.paused = true,
            Command::Resume => self.paused = false,
            Command::Close => return ControlFlow::Break(false),
            Command::Terminate(err) => {
                if let Some(err) = &err {
                    self.emit_error(err);
                }
                return ControlFlow::Break(err.is_some());
            }
        }
        ControlFlow::Continue(())
    }

    fn send_request(
        &mut self,
        payload_type: PayloadType,
        payload: Bytes,
        timeout: Option<Duration>,
        responder: Responder,
    ) {
        let sequence = self.pending.allocate();
        let sent_at = now_millis();
        let frame = match Frame::message(sequence, sent_at, payload_type, payload) {
            Ok(frame) => frame,
            Err(err) => {
                let _ = responder.send(Err(err));
                return;
            }
        };
        self.pending.register(sequence, sent_at, responder, timeout);
        trace!(sequence, length = frame.header.length, "sending request");
        self.write(frame);
    }

    fn process_buffer(&mut self) -> ControlFlow<bool> {
        loop {
            match self.buffer.next_frame() {
                Ok(Some(Inbound::Frame(frame))) => self.handle_frame(frame)?,
                Ok(Some(Inbound::Oversized(header))) => self.handle_oversized(&header)?,
                Ok(None) => return ControlFlow::Continue(()),
                // The buffer only fails once frame boundaries are lost.
                Err(err) => return self.framing_error(&err),
            }
        }
    }

    /// Report a malformed frame, ending the connection when the stream can
    /// no longer be parsed.
    fn framing_error(&self, err: &Error) -> ControlFlow<bool> {
        self.emit_error(err);
        if err.should_disconnect() {
            ControlFlow::Break(true)
        } else {
            ControlFlow::Continue(())
        }
    }

    fn handle_frame(&mut self, frame: Frame) -> ControlFlow<bool> {
        metrics::inc_frames(Direction::Inbound);
        let Frame { header, payload } = frame;
        match header.kind() {
            Ok(FrameKind::Message) => self.handle_request(&header, payload),
            Ok(kind) => self.handle_response(kind, &header, payload),
            Err(err) => return self.framing_error(&err),
        }
        ControlFlow::Continue(())
    }

    fn handle_response(&mut self, kind: FrameKind, header: &FrameHeader, payload: Bytes) {
        let meta = Meta::from(header);
        if !self.pending.contains(meta.sequence) {
            self.report_lag(kind, &meta);
            return;
        }
        let outcome = match Value::decode(header.payload_type, payload) {
            Err(err) => Err(err.with_default_field("sequence", meta.sequence)),
            Ok(value) if kind == FrameKind::Nak => Err(nak_error(&value, &meta)),
            Ok(value) => Ok(Response::new(value, meta)),
        };
        trace!(sequence = meta.sequence, kind = kind.label(), "request settled");
        self.pending.resolve(meta.sequence, outcome);
    }

    fn report_lag(&self, kind: FrameKind, meta: &Meta) {
        metrics::inc_lagged();
        self.emit_error(&Error::lag(kind.label(), meta.sequence, meta.timestamp));
    }

    fn handle_request(&mut self, header: &FrameHeader, payload: Bytes) {
        let meta = Meta::from(header);
        let value = match Value::decode(header.payload_type, payload) {
            Ok(value) => value,
            Err(err) => {
                debug!(sequence = meta.sequence, error = %err, "undecodable request");
                let err = Error::new(ErrorKind::RemoteDecode, err.message());
                self.write_reply(meta.sequence, meta.timestamp, Settled::Nak(err));
                return;
            }
        };

        let mut replies = Replies::new();
        if let Err(err) = self.hooks.handle_data(value, &meta, &mut replies) {
            debug!(sequence = meta.sequence, error = %err, "data handler failed");
            self.write_reply(meta.sequence, meta.timestamp, Settled::Nak(err));
            return;
        }
        if replies.is_empty() {
            self.write_reply(meta.sequence, meta.timestamp, Settled::Ack(Value::Null));
            return;
        }
        let (sequence, timestamp) = (meta.sequence, meta.timestamp);
        self.replies.push(
            async move {
                SettledReply {
                    sequence,
                    timestamp,
                    settled: replies.settle().await,
                }
            }
            .boxed(),
        );
    }

    fn handle_oversized(&mut self, header: &FrameHeader) -> ControlFlow<bool> {
        let err = Error::frame_too_long(header.length, self.buffer.max_frame_size())
            .with_field("sequence", header.sequence);
        self.emit_error(&err);
        match header.kind() {
            Ok(FrameKind::Message) => {
                self.write_reply(header.sequence, header.timestamp(), Settled::Nak(err));
            }
            Ok(kind) => {
                if !self.pending.resolve(header.sequence, Err(err)) {
                    self.report_lag(kind, &Meta::from(header));
                }
            }
            Err(flags) => return self.framing_error(&flags),
        }
        ControlFlow::Continue(())
    }

    fn write_reply(&mut self, sequence: u32, timestamp: Option<f64>, settled: Settled) {
        let frame = match settled {
            Settled::Ack(value) => Frame::ack(sequence, timestamp, &value),
            Settled::Nak(err) => Frame::nak(sequence, timestamp, &err),
        }
        .or_else(|err| {
            let err = Error::new(ErrorKind::RemoteEncode, err.message());
            Frame::nak(sequence, timestamp, &err)
        });
        match frame {
            Ok(frame) => self.write(frame),
            Err(err) => self.emit_error(&err),
        }
    }

    /// Queue `frame` for the writer task.
    ///
    /// A stopped writer is reported through [`Event::WriteFailed`].
    fn write(&mut self, frame: Frame) {
        if self.writer.as_ref().is_some_and(|writer| writer.queue(frame)) {
            metrics::inc_frames(Direction::Outbound);
        }
    }

    fn emit_error(&self, err: &Error) {
        metrics::inc_errors(err.kind());
        warn!(peer_addr = ?self.peer_addr, error = %err, "connection error");
        self.hooks.emit_error(err);
    }

    async fn shutdown(&mut self, had_error: bool) {
        self.state.send_replace(ConnectionState::Closed);
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Send { responder, .. } = command {
                let _ = responder.send(Err(Error::cannot_write()));
            }
        }
        let rejected = self.pending.close(had_error);
        self.replies.clear();
        match self.writer.take() {
            Some(writer) if !had_error => {
                if let Err(err) = writer.finish().await {
                    debug!(error = %err, "failed to flush on close");
                }
            }
            Some(writer) => writer.abort(),
            None => {}
        }
        debug!(peer_addr = ?self.peer_addr, had_error, rejected, "connection closed");
        self.hooks.emit_close(had_error);
    }
}

impl<S> Drop for ConnectionActor<S> {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            let changed = *state != ConnectionState::Closed;
            *state = ConnectionState::Closed;
            changed
        });
    }
}

fn nak_error(value: &Value, meta: &Meta) -> Error {
    let json = value.as_json().cloned().unwrap_or_default();
    Error::from_nak_payload(&json)
        .with_default_field("sequence", meta.sequence)
        .with_default_field("timestamp", meta.timestamp)
}
