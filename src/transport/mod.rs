//! Native transport contract.
//!
//! A [`NativeTransport`] is the callback-driven engine that performs the
//! actual network exchange. The adapter never sees its internals: it asks the
//! engine to connect, activate streams, write body fragments and shut down,
//! and the engine answers exclusively through the sinks it was handed
//! ([`ConnectionSink`], [`StreamSink`]), from whatever thread it likes.
//!
//! Two engines ship with the crate:
//! - [`hyperengine::HyperTransport`]: hyper on a private multi-thread runtime
//! - [`scripted::ScriptedTransport`]: a manual engine for tests

pub(crate) mod body;
pub mod hyperengine;
pub mod scripted;

pub use hyperengine::{HyperTransport, HyperTransportConfig};
pub use scripted::ScriptedTransport;

use crate::connection::ConnectOptions;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::relay::{ConnectionSink, StreamSink};
use bytes::Bytes;
use http::Method;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a connection, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Stable identity of a stream, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// What the engine needs to start an exchange.
#[derive(Debug, Clone)]
pub struct NativeRequest {
    pub method: Method,
    /// Path and query, e.g. `/index.html?x=1`.
    pub path: String,
    pub headers: OrderedHeaderMap,
    /// Pre-buffered body, sent by the engine itself.
    pub body: Option<Bytes>,
    /// The body arrives later through [`NativeTransport::write`].
    pub streaming_body: bool,
}

/// Callback-driven engine.
///
/// Every method must return promptly; results are reported through the sinks.
/// The engine must honor the callback contract:
/// - `on_status` at most once, before `on_headers`
/// - `on_headers` at most once, before any `on_chunk`
/// - `on_complete` exactly once per activated stream
/// - `on_write_complete` once per `write` call
/// - `on_setup` / `on_shutdown` at most once per connection
pub trait NativeTransport: Send + Sync + 'static {
    /// Begin establishing a connection. Report via `events.on_setup`.
    fn connect(&self, connection: ConnectionId, options: &ConnectOptions, events: ConnectionSink);

    /// Start an exchange on an established connection.
    fn activate(
        &self,
        connection: ConnectionId,
        stream: StreamId,
        request: NativeRequest,
        events: StreamSink,
    );

    /// Submit one body fragment for a streaming exchange.
    fn write(&self, stream: StreamId, data: Bytes, end_stream: bool);

    /// Tear the connection down. Report via `on_shutdown`.
    fn shutdown(&self, connection: ConnectionId);
}
