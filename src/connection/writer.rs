//! Outbound half of a connection.
//!
//! Frames are queued on an unbounded channel and written by a dedicated
//! task, so the actor keeps reading while a slow peer drains its output.
//! Frames already queued when the channel closes are flushed before the
//! write half is shut down.

use std::io;

use futures::SinkExt;
use tokio::{io::AsyncWrite, sync::mpsc, task::JoinHandle};
use tokio_util::codec::FramedWrite;

use crate::{codec::FrameCodec, frame::Frame};

pub(super) struct Writer {
    frames: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<io::Result<()>>,
}

impl Writer {
    pub(super) fn spawn<W>(io: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (frames, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(rx, FramedWrite::new(io, FrameCodec)));
        Self { frames, task }
    }

    /// Queue `frame` behind everything queued before it.
    ///
    /// Returns `false` once the task has stopped.
    pub(super) fn queue(&self, frame: Frame) -> bool { self.frames.send(frame).is_ok() }

    /// Resolves when the task stops while frames can still be queued, which
    /// only happens on a write error.
    ///
    /// Must not be polled again after it resolves.
    pub(super) async fn failed(&mut self) -> io::Error {
        match (&mut self.task).await {
            Ok(Ok(())) => io::Error::new(io::ErrorKind::BrokenPipe, "writer stopped"),
            Ok(Err(err)) => err,
            Err(join) => io::Error::other(join),
        }
    }

    /// Flush every queued frame and shut the write half down.
    pub(super) async fn finish(self) -> io::Result<()> {
        let Self { frames, task } = self;
        drop(frames);
        task.await.unwrap_or_else(|join| Err(io::Error::other(join)))
    }

    /// Stop without flushing.
    pub(super) fn abort(self) { self.task.abort(); }
}

async fn write_loop<W>(
    mut frames: mpsc::UnboundedReceiver<Frame>,
    mut sink: FramedWrite<W, FrameCodec>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        sink.feed(frame).await?;
        while let Ok(frame) = frames.try_recv() {
            sink.feed(frame).await?;
        }
        sink.flush().await?;
    }
    sink.close().await
}
