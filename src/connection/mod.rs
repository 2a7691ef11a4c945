//! Connection adapter.
//!
//! A [`Connection`] owns one native connection and opens [`Stream`]s on it.
//! Connection-scoped engine events (setup, shutdown, remote settings) flow
//! through the same relay as stream events and land in a connection record
//! that the relay, not the consumer, keeps alive.
//!
//! The native connection is shut down when the last handle referring to it
//! goes away: the `Connection` itself, any `Stream`, or any pending
//! `Stream::completion()` future.

mod options;
pub(crate) mod record;

pub use options::ConnectOptions;

use crate::base::neterror::NetError;
use crate::http::h2settings::H2Settings;
use crate::http::pump;
use crate::http::record::StreamRecord;
use crate::http::request::HttpRequest;
use crate::http::stream::Stream;
use crate::relay::EventRelay;
use crate::transport::{ConnectionId, NativeTransport, StreamId};
use http::Version;
use record::ConnectionRecord;
use std::sync::Arc;

pub(crate) struct ConnectionInner {
    pub(crate) record: Arc<ConnectionRecord>,
    pub(crate) relay: EventRelay,
    pub(crate) transport: Arc<dyn NativeTransport>,
    version: Version,
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        if !self.record.shutdown.is_resolved() {
            tracing::debug!(connection = %self.record.id(), "last handle dropped, shutting down");
            self.transport.shutdown(self.record.id());
        }
    }
}

/// Handle to an established native connection. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Ask the engine to connect and wait for its setup notice.
    ///
    /// Dropping the returned future before it resolves shuts the native
    /// connection down.
    pub async fn connect(
        transport: Arc<dyn NativeTransport>,
        options: ConnectOptions,
    ) -> Result<Self, NetError> {
        let id = ConnectionId::next();
        let record = Arc::new(ConnectionRecord::new(id, H2Settings::default()));
        let relay = EventRelay::spawn(record.clone());
        let events = relay.connection_sink();
        let inner = Arc::new(ConnectionInner {
            record,
            relay,
            transport,
            version: options.version,
        });

        tracing::debug!(
            connection = %id,
            host = %options.host,
            port = options.port,
            version = ?options.version,
            "connecting"
        );
        inner.transport.connect(id, &options, events);
        inner.record.setup.wait().await?;

        Ok(Self { inner })
    }

    /// Start an exchange. Returns as soon as the engine has been asked to
    /// activate the stream; response data arrives through the [`Stream`].
    ///
    /// A [`RequestBody::Stream`](crate::http::requestbody::RequestBody::Stream)
    /// body is pumped by a spawned task; a failure there becomes the
    /// stream's completion error.
    pub fn request(&self, request: HttpRequest) -> Result<Stream, NetError> {
        if let Some(reason) = self.inner.record.closed_reason() {
            tracing::debug!(connection = %self.id(), error = %reason, "request on closed connection");
            return Err(NetError::ConnectionClosed);
        }
        if request.needs_writes() && !self.is_multiplexed() {
            return Err(NetError::MultiplexingRequired);
        }

        let manual_write = request.is_manual_write();
        let (native, producer) = request.into_native()?;

        let id = StreamId::next();
        let record = Arc::new(StreamRecord::new(id));
        record.mark_activated();
        // Attach is enqueued before the engine can emit anything for `id`.
        self.inner.relay.attach(record.clone());
        let events = self.inner.relay.stream_sink(id);

        tracing::debug!(
            connection = %self.id(),
            stream = %id,
            method = %native.method,
            path = %native.path,
            "activating stream"
        );
        self.inner
            .transport
            .activate(self.id(), id, native, events.clone());

        let stream = Stream::new(record, self.inner.clone(), manual_write);
        if let Some(producer) = producer {
            let writer = stream.writer();
            tokio::spawn(async move {
                if let Err(e) = pump::drive(&writer, producer).await {
                    events.abort(e);
                }
            });
        }
        Ok(stream)
    }

    /// Shut the native connection down and wait for its shutdown notice.
    ///
    /// Streams still running complete with `ConnectionClosed`. Returns the
    /// reason if the connection had already failed.
    pub async fn close(&self) -> Result<(), NetError> {
        if !self.inner.record.shutdown.is_resolved() {
            self.inner.transport.shutdown(self.id());
        }
        self.inner.record.shutdown.wait().await
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.record.id()
    }

    pub fn version(&self) -> Version {
        self.inner.version
    }

    pub fn is_multiplexed(&self) -> bool {
        self.inner.version == Version::HTTP_2
    }

    pub fn is_closed(&self) -> bool {
        self.inner.record.shutdown.is_resolved()
    }

    /// Streams on this connection that have not completed yet.
    pub fn open_streams(&self) -> usize {
        self.inner.record.open_streams()
    }

    /// Latest settings announced by the peer (RFC defaults until then).
    pub fn remote_settings(&self) -> H2Settings {
        self.inner.record.remote_settings()
    }

    /// Wait for the next remote settings notice.
    pub async fn settings_changed(&self) -> Result<H2Settings, NetError> {
        let mut rx = self.inner.record.subscribe_settings();
        tokio::select! {
            changed = rx.changed() => {
                changed.map_err(|_| NetError::ConnectionClosed)?;
                let settings = *rx.borrow_and_update();
                Ok(settings)
            }
            outcome = self.inner.record.shutdown.wait() => {
                Err(outcome.err().unwrap_or(NetError::ConnectionClosed))
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("version", &self.inner.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}
