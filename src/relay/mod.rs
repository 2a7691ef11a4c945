//! Cross-thread event relay.
//!
//! The one synchronization boundary between native engine threads and the
//! consumer. Engines call [`StreamSink`] / [`ConnectionSink`] methods from any
//! thread; each call becomes one [`RelayEvent`] on an unbounded MPSC channel.
//! A single dispatcher task per connection drains the channel on the
//! consumer's runtime and applies the events in arrival order, so every
//! record has exactly one writer.
//!
//! The dispatcher pins each stream record from `Attach` until the stream
//! completes, which keeps it alive while engine callbacks can still arrive.
//! Events addressed to a record that is no longer pinned are dropped.

mod event;
mod sink;

pub(crate) use event::{ConnectionEvent, RelayEvent, StreamEvent};
pub use sink::{ConnectionSink, StreamSink};

use crate::connection::record::ConnectionRecord;
use crate::http::record::StreamRecord;
use crate::transport::StreamId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Consumer-side handle to a connection's relay.
pub(crate) struct EventRelay {
    record: Arc<ConnectionRecord>,
    tx: UnboundedSender<RelayEvent>,
}

impl EventRelay {
    /// Spawn the dispatcher on the current tokio runtime.
    pub(crate) fn spawn(record: Arc<ConnectionRecord>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx, record.clone()));
        Self { record, tx }
    }

    /// Start tracking `record`. Must be called before the engine can emit
    /// anything for it.
    pub(crate) fn attach(&self, record: Arc<StreamRecord>) {
        self.record.track_stream(&record);
        let id = record.id();
        if self.tx.send(RelayEvent::Attach(id, record)).is_err() {
            tracing::warn!(stream = %id, "relay dispatcher is gone; stream will never resolve");
        }
    }

    pub(crate) fn stream_sink(&self, stream: StreamId) -> StreamSink {
        StreamSink::new(stream, self.tx.clone())
    }

    pub(crate) fn connection_sink(&self) -> ConnectionSink {
        ConnectionSink::new(self.record.id(), self.tx.clone())
    }
}

async fn dispatch(mut rx: UnboundedReceiver<RelayEvent>, connection: Arc<ConnectionRecord>) {
    let mut live: HashMap<StreamId, Arc<StreamRecord>> = HashMap::new();

    while let Some(event) = rx.recv().await {
        match event {
            RelayEvent::Attach(id, record) => {
                if let Some(reason) = connection.closed_reason() {
                    record.apply(StreamEvent::Abort(reason));
                    connection.forget_stream(id);
                    continue;
                }
                live.insert(id, record);
            }
            RelayEvent::Stream(id, event) => {
                let Some(record) = live.get(&id) else {
                    tracing::trace!(stream = %id, ?event, "dropping event for released stream");
                    continue;
                };
                if record.apply(event) {
                    live.remove(&id);
                    connection.forget_stream(id);
                }
            }
            RelayEvent::Connection(event) => {
                if let Some(reason) = connection.apply(event) {
                    for (id, record) in live.drain() {
                        record.apply(StreamEvent::Abort(reason));
                        connection.forget_stream(id);
                    }
                }
            }
        }
    }

    tracing::trace!(connection = %connection.id(), "relay drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::neterror::NetError;
    use crate::http::h2settings::H2Settings;
    use crate::transport::ConnectionId;

    fn relay() -> (EventRelay, Arc<ConnectionRecord>) {
        let record = Arc::new(ConnectionRecord::new(
            ConnectionId::next(),
            H2Settings::default(),
        ));
        (EventRelay::spawn(record.clone()), record)
    }

    #[tokio::test]
    async fn test_events_apply_in_order() {
        let (relay, _connection) = relay();
        let stream = Arc::new(StreamRecord::new(StreamId::next()));
        stream.mark_activated();
        relay.attach(stream.clone());

        let sink = relay.stream_sink(stream.id());
        std::thread::spawn(move || {
            sink.on_status(204);
            sink.on_headers([("server", "native")]);
            sink.on_complete(None);
        })
        .join()
        .unwrap();

        assert_eq!(stream.completion.wait().await, Ok(204));
        let headers = stream.headers.get().unwrap();
        assert_eq!(headers.get("server").unwrap(), "native");
    }

    #[tokio::test]
    async fn test_native_codes_are_translated() {
        let (relay, _connection) = relay();
        let stream = Arc::new(StreamRecord::new(StreamId::next()));
        stream.mark_activated();
        relay.attach(stream.clone());

        relay.stream_sink(stream.id()).on_complete(Some(-101));
        assert_eq!(
            stream.completion.wait().await,
            Err(NetError::ConnectionReset)
        );
    }

    #[tokio::test]
    async fn test_events_for_unknown_stream_are_dropped() {
        let (relay, connection) = relay();
        relay.stream_sink(StreamId::next()).on_status(200);
        relay.connection_sink().on_setup(None);
        assert_eq!(connection.setup.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_live_streams() {
        let (relay, connection) = relay();
        let stream = Arc::new(StreamRecord::new(StreamId::next()));
        stream.mark_activated();
        relay.attach(stream.clone());
        assert_eq!(connection.open_streams(), 1);

        relay.connection_sink().on_shutdown(Some(-100));
        assert_eq!(
            stream.completion.wait().await,
            Err(NetError::ConnectionClosed)
        );
        assert_eq!(connection.shutdown.wait().await, Err(NetError::ConnectionClosed));
        assert_eq!(connection.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_attach_after_shutdown_aborts_immediately() {
        let (relay, connection) = relay();
        relay.connection_sink().on_shutdown(Some(-101));
        connection.shutdown.wait().await.unwrap_err();

        let stream = Arc::new(StreamRecord::new(StreamId::next()));
        stream.mark_activated();
        relay.attach(stream.clone());
        assert_eq!(
            stream.completion.wait().await,
            Err(NetError::ConnectionReset)
        );
    }
}
