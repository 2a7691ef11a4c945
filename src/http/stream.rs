//! Async stream adapter.
//!
//! A [`Stream`] is the consumer's view of one exchange. Every method only
//! reads the stream's record or registers a waiter on it; the relay is what
//! moves the record forward.

use crate::base::neterror::NetError;
use crate::base::streamstate::StreamState;
use crate::connection::ConnectionInner;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::pump;
use crate::http::record::{ReadAttempt, StreamRecord};
use crate::transport::StreamId;
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::sync::Arc;

/// One request/response exchange.
///
/// Dropping a `Stream` does not cancel the exchange. The engine keeps
/// running it to completion and unread body data is discarded.
pub struct Stream {
    record: Arc<StreamRecord>,
    connection: Arc<ConnectionInner>,
    manual_write: bool,
}

/// Submits Write Requests for one stream.
pub(crate) struct StreamWriter {
    record: Arc<StreamRecord>,
    connection: Arc<ConnectionInner>,
}

impl StreamWriter {
    /// Send one fragment and wait for the engine to acknowledge it.
    ///
    /// Once the stream has completed this returns the completion error
    /// without reaching the engine.
    pub(crate) async fn submit(&self, data: Bytes, end_stream: bool) -> Result<(), NetError> {
        let waiter = self.record.begin_write(end_stream).await?;
        tracing::trace!(stream = %self.record.id(), len = data.len(), end_stream, "write");
        self.connection
            .transport
            .write(self.record.id(), data, end_stream);
        waiter.await.unwrap_or(Err(NetError::ConnectionAborted))
    }

    pub(crate) fn completed_cleanly(&self) -> bool {
        matches!(self.record.completion.get(), Some(Ok(_)))
    }
}

impl Stream {
    pub(crate) fn new(
        record: Arc<StreamRecord>,
        connection: Arc<ConnectionInner>,
        manual_write: bool,
    ) -> Self {
        Self {
            record,
            connection,
            manual_write,
        }
    }

    pub(crate) fn writer(&self) -> StreamWriter {
        StreamWriter {
            record: self.record.clone(),
            connection: self.connection.clone(),
        }
    }

    pub fn id(&self) -> StreamId {
        self.record.id()
    }

    pub fn state(&self) -> StreamState {
        self.record.state()
    }

    /// Response status code.
    ///
    /// If the exchange ends before a status arrives, this returns the
    /// completion error instead.
    pub async fn status(&self) -> Result<u16, NetError> {
        tokio::select! {
            biased;
            code = self.record.status.wait() => Ok(code),
            outcome = self.record.completion.wait() => match self.record.status.get() {
                Some(code) => Ok(code),
                None => outcome,
            },
        }
    }

    /// Response headers in wire order. Resolves only after [`status`](Self::status).
    ///
    /// A clean completion without a header block yields an empty map.
    pub async fn headers(&self) -> Result<OrderedHeaderMap, NetError> {
        self.status().await?;
        tokio::select! {
            biased;
            headers = self.record.headers.wait() => Ok(headers),
            outcome = self.record.completion.wait() => match self.record.headers.get() {
                Some(headers) => Ok(headers),
                None => outcome.map(|_| OrderedHeaderMap::new()),
            },
        }
    }

    /// Next body chunk in arrival order, or `None` at end of stream.
    ///
    /// End of stream is also returned when the exchange failed; check
    /// [`wait_for_completion`](Self::wait_for_completion) for the outcome.
    /// Cancelling this future loses no data.
    pub async fn next_chunk(&self) -> Option<Bytes> {
        loop {
            // Register before checking so a chunk queued in between still wakes us.
            let readable = self.record.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            if let ReadAttempt::Ready(chunk) = self.record.try_read() {
                return chunk;
            }
            readable.await;
        }
    }

    /// Terminal status code, or the error the exchange failed with.
    pub async fn wait_for_completion(&self) -> Result<u16, NetError> {
        self.record.completion.wait().await
    }

    /// Like [`wait_for_completion`](Self::wait_for_completion), but the
    /// future owns what it needs, so the `Stream` can be dropped.
    pub fn completion(&self) -> impl Future<Output = Result<u16, NetError>> + Send + 'static {
        let record = self.record.clone();
        let connection = self.connection.clone();
        async move {
            let outcome = record.completion.wait().await;
            drop(connection);
            outcome
        }
    }

    /// Write one body fragment. Only for streams opened with
    /// [`HttpRequest::manual_write`](crate::http::request::HttpRequest::manual_write).
    ///
    /// Suspends while a previous write is unacknowledged. A write error is
    /// also the stream's completion error.
    pub async fn write(&self, data: impl Into<Bytes>, end_stream: bool) -> Result<(), NetError> {
        if !self.manual_write {
            return Err(NetError::ManualWriteDisabled);
        }
        self.writer().submit(data.into(), end_stream).await
    }

    /// Pump a whole body from `producer`, then end the stream.
    pub async fn send_body<S, E>(&self, producer: S) -> Result<(), NetError>
    where
        S: futures::Stream<Item = Result<Bytes, E>> + Send,
        E: Into<NetError>,
    {
        if !self.manual_write {
            return Err(NetError::ManualWriteDisabled);
        }
        pump::drive(&self.writer(), producer).await
    }

    /// Collect the body, then check the outcome.
    pub async fn bytes(&self) -> Result<Bytes, NetError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            body.extend_from_slice(&chunk);
        }
        self.wait_for_completion().await?;
        Ok(body.freeze())
    }

    pub async fn text(&self) -> Result<String, NetError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|_| NetError::InvalidUtf8)
    }

    #[cfg(feature = "json")]
    pub async fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|_| NetError::JsonParseError)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("manual_write", &self.manual_write)
            .finish()
    }
}
