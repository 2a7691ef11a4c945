//! Thread-safe callback endpoints handed to native engines.
//!
//! Sinks are cheap to clone and may be called from any thread. Each call
//! translates its arguments into typed values and enqueues exactly one event;
//! nothing blocks. If the consumer side is gone the event is dropped.

use super::event::{ConnectionEvent, RelayEvent, StreamEvent};
use crate::base::neterror::NetError;
use crate::http::h2settings::Setting;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::transport::{ConnectionId, StreamId};
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

/// Callback endpoint for one stream.
#[derive(Clone)]
pub struct StreamSink {
    stream: StreamId,
    tx: UnboundedSender<RelayEvent>,
}

impl StreamSink {
    pub(crate) fn new(stream: StreamId, tx: UnboundedSender<RelayEvent>) -> Self {
        Self { stream, tx }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream
    }

    pub fn on_status(&self, code: u16) {
        self.send(StreamEvent::Status(code));
    }

    /// Raw header pairs in wire order. Values are passed through byte for byte.
    pub fn on_headers<I, N, V>(&self, pairs: I)
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<[u8]>,
    {
        self.send(StreamEvent::Headers(OrderedHeaderMap::from_pairs(pairs)));
    }

    pub fn on_chunk(&self, chunk: Bytes) {
        self.send(StreamEvent::Chunk(chunk));
    }

    /// Terminal notice; `error` is a native error code.
    pub fn on_complete(&self, error: Option<i32>) {
        self.send(StreamEvent::Complete(error.map(NetError::from)));
    }

    /// Acknowledges the stream's in-flight write.
    pub fn on_write_complete(&self, error: Option<i32>) {
        self.send(StreamEvent::WriteComplete(error.map(NetError::from)));
    }

    pub(crate) fn abort(&self, error: NetError) {
        self.send(StreamEvent::Abort(error));
    }

    fn send(&self, event: StreamEvent) {
        if self.tx.send(RelayEvent::Stream(self.stream, event)).is_err() {
            tracing::trace!(stream = %self.stream, "relay closed, dropping stream event");
        }
    }
}

impl std::fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSink")
            .field("stream", &self.stream)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Callback endpoint for one connection.
#[derive(Clone)]
pub struct ConnectionSink {
    connection: ConnectionId,
    tx: UnboundedSender<RelayEvent>,
}

impl ConnectionSink {
    pub(crate) fn new(connection: ConnectionId, tx: UnboundedSender<RelayEvent>) -> Self {
        Self { connection, tx }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    /// Sink for a stream on this connection. Engines normally receive the
    /// stream sink through `activate`; this is for engines that open streams
    /// on their own.
    pub fn stream_sink(&self, stream: StreamId) -> StreamSink {
        StreamSink::new(stream, self.tx.clone())
    }

    pub fn on_setup(&self, error: Option<i32>) {
        self.send(ConnectionEvent::Setup(error.map(NetError::from)));
    }

    pub fn on_shutdown(&self, reason: Option<i32>) {
        self.send(ConnectionEvent::Shutdown(reason.map(NetError::from)));
    }

    /// Remote peer changed its settings (multiplexed variant only).
    pub fn on_remote_settings_changed(&self, settings: Vec<Setting>) {
        self.send(ConnectionEvent::RemoteSettings(settings));
    }

    fn send(&self, event: ConnectionEvent) {
        if self.tx.send(RelayEvent::Connection(event)).is_err() {
            tracing::trace!(connection = %self.connection, "relay closed, dropping connection event");
        }
    }
}

impl std::fmt::Debug for ConnectionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSink")
            .field("connection", &self.connection)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
