//! Per-exchange state shared between the relay and the stream adapter.
//!
//! The relay's dispatcher is the only code that applies engine events to a
//! [`StreamRecord`]; the adapter only claims chunks and registers waiters.
//! The inner mutex is never held across an await.
//!
//! Chunks stay in the backlog until a reader claims one under the lock, so a
//! reader that is cancelled between wake-up and claim leaves nothing behind.

use crate::base::neterror::NetError;
use crate::base::streamstate::StreamState;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::signal::Signal;
use crate::relay::StreamEvent;
use crate::transport::StreamId;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, Notify, Semaphore};

/// Resolution handle of the single in-flight Write Request.
type WriteWaiter = oneshot::Sender<Result<(), NetError>>;

/// Outcome of a next-chunk attempt.
pub(crate) enum ReadAttempt {
    /// A chunk, or `None` for end of stream.
    Ready(Option<Bytes>),
    /// Nothing buffered yet; wait on [`StreamRecord::readable`].
    Pending,
}

pub(crate) struct StreamRecord {
    id: StreamId,
    pub(crate) status: Signal<u16>,
    pub(crate) headers: Signal<OrderedHeaderMap>,
    pub(crate) completion: Signal<Result<u16, NetError>>,
    /// Woken when a chunk is queued or the stream completes.
    pub(crate) readable: Notify,
    /// One unit of write credit; returned when the engine acknowledges.
    write_credit: Semaphore,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: StreamState,
    backlog: VecDeque<Bytes>,
    closed: bool,
    pending_write: Option<WriteWaiter>,
    end_stream_sent: bool,
}

impl StreamRecord {
    pub(crate) fn new(id: StreamId) -> Self {
        Self {
            id,
            status: Signal::new(),
            headers: Signal::new(),
            completion: Signal::new(),
            readable: Notify::new(),
            write_credit: Semaphore::new(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub(crate) fn id(&self) -> StreamId {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> StreamState {
        self.lock().state
    }

    pub(crate) fn mark_activated(&self) {
        let mut inner = self.lock();
        if inner.state == StreamState::Created {
            inner.state = StreamState::Activated;
        }
    }

    /// Claim the oldest chunk or report end of stream.
    pub(crate) fn try_read(&self) -> ReadAttempt {
        let mut inner = self.lock();
        match inner.backlog.pop_front() {
            Some(chunk) => ReadAttempt::Ready(Some(chunk)),
            None if inner.closed => ReadAttempt::Ready(None),
            None => ReadAttempt::Pending,
        }
    }

    /// Take the stream's write credit and register a Write Request.
    ///
    /// Suspends while a previous write is still unacknowledged.
    pub(crate) async fn begin_write(
        &self,
        end_stream: bool,
    ) -> Result<oneshot::Receiver<Result<(), NetError>>, NetError> {
        let Ok(permit) = self.write_credit.acquire().await else {
            return Err(self.closed_write_error());
        };

        let mut inner = self.lock();
        if inner.closed {
            return Err(self.closed_write_error());
        }
        if inner.end_stream_sent {
            return Err(NetError::WriteAfterEndStream);
        }
        // Credit comes back only through the engine's acknowledgement.
        permit.forget();
        let (tx, rx) = oneshot::channel();
        inner.pending_write = Some(tx);
        inner.end_stream_sent = end_stream;
        Ok(rx)
    }

    /// Error returned to writers once the stream can no longer accept data.
    fn closed_write_error(&self) -> NetError {
        match self.completion.get() {
            Some(Err(e)) => e,
            _ => NetError::StreamClosed,
        }
    }

    /// Apply one relayed event. Returns `true` once the stream is completed
    /// and the relay may stop tracking it.
    pub(crate) fn apply(&self, event: StreamEvent) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            tracing::trace!(stream = %self.id, "dropping event for completed stream");
            return true;
        }

        match event {
            StreamEvent::Status(code) => {
                if inner.state != StreamState::Activated || self.status.is_resolved() {
                    self.violate(&mut inner, "status delivered out of order");
                } else {
                    self.status.resolve(code);
                }
            }
            StreamEvent::Headers(Ok(headers)) => {
                if !self.status.is_resolved() {
                    self.violate(&mut inner, "headers delivered before status");
                } else if inner.state != StreamState::Activated {
                    self.violate(&mut inner, "headers delivered twice");
                } else {
                    self.headers.resolve(headers);
                    inner.state = StreamState::HeadersReceived;
                }
            }
            StreamEvent::Headers(Err(e)) => self.finish(&mut inner, Err(e)),
            StreamEvent::Chunk(chunk) => {
                if inner.state < StreamState::HeadersReceived {
                    self.violate(&mut inner, "body chunk delivered before headers");
                } else {
                    inner.state = StreamState::Receiving;
                    if !chunk.is_empty() {
                        inner.backlog.push_back(chunk);
                        self.readable.notify_waiters();
                    }
                }
            }
            StreamEvent::WriteComplete(error) => {
                let Some(waiter) = inner.pending_write.take() else {
                    tracing::trace!(stream = %self.id, "dropping unmatched write completion");
                    return false;
                };
                self.write_credit.add_permits(1);
                match error {
                    None => {
                        let _ = waiter.send(Ok(()));
                    }
                    Some(e) => {
                        // The writer and the completion observer see the same error.
                        let _ = waiter.send(Err(e));
                        self.finish(&mut inner, Err(e));
                    }
                }
            }
            StreamEvent::Complete(None) => {
                let outcome = self.status.get().ok_or(NetError::EmptyResponse);
                self.finish(&mut inner, outcome);
            }
            StreamEvent::Complete(Some(e)) | StreamEvent::Abort(e) => {
                self.finish(&mut inner, Err(e));
            }
        }

        inner.state.is_terminal()
    }

    fn violate(&self, inner: &mut Inner, what: &'static str) {
        tracing::error!(stream = %self.id, violation = what, "native transport broke the callback contract");
        self.finish(inner, Err(NetError::ContractViolation(what)));
    }

    fn finish(&self, inner: &mut Inner, outcome: Result<u16, NetError>) {
        if !self.completion.resolve(outcome) {
            return;
        }
        inner.state = StreamState::Completed;
        inner.closed = true;
        // Pending readers observe end of stream, never the error itself.
        self.readable.notify_waiters();
        if let Some(waiter) = inner.pending_write.take() {
            let _ = waiter.send(outcome.map(|_| ()));
        }
        self.write_credit.close();

        match outcome {
            Ok(status) => tracing::debug!(stream = %self.id, status, "stream completed"),
            Err(e) => tracing::debug!(stream = %self.id, error = %e, "stream failed"),
        }
    }
}
