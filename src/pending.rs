//! Outstanding request bookkeeping.
//!
//! Every send registers a [`PendingRequest`] under its sequence number. The
//! entry leaves the table exactly once: on ACK, NAK, timeout or close. ACKs
//! and NAKs for sequences no longer in the table are reported as lag by the
//! connection.

use std::{
    collections::HashMap,
    future::poll_fn,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::sync::oneshot;
use tokio_util::time::{DelayQueue, delay_queue};

use crate::{error::Error, response::Response};

/// Channel completing a send.
pub(crate) type Responder = oneshot::Sender<Result<Response, Error>>;

/// Milliseconds since the Unix epoch, as carried in frame timestamps.
#[must_use]
pub fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64() * 1_000.0)
}

/// 32-bit sequence generator that wraps to zero after `u32::MAX`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    #[must_use]
    pub const fn new() -> Self { Self { next: 0 } }

    #[must_use]
    pub const fn starting_at(next: u32) -> Self { Self { next } }

    /// Return the current sequence and advance.
    pub const fn next_sequence(&mut self) -> u32 {
        let sequence = self.next;
        self.next = sequence.wrapping_add(1);
        sequence
    }
}

/// A send awaiting its ACK or NAK.
#[derive(Debug)]
pub struct PendingRequest {
    pub sequence: u32,
    /// Milliseconds since the Unix epoch when the frame was queued.
    pub sent_at: f64,
    responder: Responder,
    timer: Option<delay_queue::Key>,
}

impl PendingRequest {
    fn complete(self, outcome: Result<Response, Error>) {
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.responder.send(outcome);
    }
}

/// Pending requests of one connection, keyed by sequence.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<u32, PendingRequest>,
    timers: DelayQueue<u32>,
    counter: SequenceCounter,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Table allocating sequences from `counter`.
    #[must_use]
    pub fn with_counter(counter: SequenceCounter) -> Self {
        Self {
            entries: HashMap::new(),
            timers: DelayQueue::new(),
            counter,
        }
    }

    /// Allocate the next sequence, skipping any still in use after a wrap.
    pub fn allocate(&mut self) -> u32 {
        loop {
            let sequence = self.counter.next_sequence();
            if !self.entries.contains_key(&sequence) {
                return sequence;
            }
        }
    }

    /// Track a request and arm its timeout, if any. A zero timeout expires on
    /// the next poll of [`PendingTable::next_expired`].
    pub(crate) fn register(
        &mut self,
        sequence: u32,
        sent_at: f64,
        responder: Responder,
        timeout: Option<Duration>,
    ) {
        let timer = timeout.map(|limit| self.timers.insert(sequence, limit));
        let previous = self.entries.insert(
            sequence,
            PendingRequest {
                sequence,
                sent_at,
                responder,
                timer,
            },
        );
        debug_assert!(previous.is_none(), "sequence {sequence} registered twice");
    }

    #[must_use]
    pub fn contains(&self, sequence: u32) -> bool { self.entries.contains_key(&sequence) }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Whether any timeout is armed.
    #[must_use]
    pub fn has_timers(&self) -> bool { !self.timers.is_empty() }

    /// Complete the request for `sequence`.
    ///
    /// Returns `false` when no such request is pending.
    pub fn resolve(&mut self, sequence: u32, outcome: Result<Response, Error>) -> bool {
        let Some(mut entry) = self.entries.remove(&sequence) else {
            return false;
        };
        if let Some(key) = entry.timer.take() {
            self.timers.try_remove(&key);
        }
        entry.complete(outcome);
        true
    }

    /// Wait for the next armed timeout and return its sequence.
    ///
    /// Resolves to `None` immediately when no timer is armed.
    pub async fn next_expired(&mut self) -> Option<u32> {
        poll_fn(|cx| self.timers.poll_expired(cx))
            .await
            .map(|expired| expired.into_inner())
    }

    /// Reject the request for `sequence` with a timeout error.
    pub fn expire(&mut self, sequence: u32) -> bool {
        let Some(mut entry) = self.entries.remove(&sequence) else {
            return false;
        };
        entry.timer = None;
        let err = Error::timeout(sequence, entry.sent_at);
        entry.complete(Err(err));
        true
    }

    /// Reject every pending request with a closed-connection error.
    ///
    /// Returns the number of requests rejected.
    pub fn close(&mut self, had_error: bool) -> usize {
        self.timers.clear();
        let mut entries: Vec<_> = self.entries.drain().map(|(_, entry)| entry).collect();
        entries.sort_by_key(|entry| entry.sequence);
        let count = entries.len();
        for entry in entries {
            let err = Error::closed_pending(entry.sequence, entry.sent_at, had_error);
            entry.complete(Err(err));
        }
        count
    }
}

impl Drop for PendingTable {
    // A table dropped with live entries belongs to a connection that never
    // shut down cleanly, e.g. one whose task panicked.
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            self.close(true);
        }
    }
}
