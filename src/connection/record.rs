//! Connection-scoped state, written only by the relay dispatcher.

use crate::base::neterror::NetError;
use crate::http::h2settings::H2Settings;
use crate::http::record::StreamRecord;
use crate::http::signal::Signal;
use crate::relay::ConnectionEvent;
use crate::transport::{ConnectionId, StreamId};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

pub(crate) struct ConnectionRecord {
    id: ConnectionId,
    pub(crate) setup: Signal<Result<(), NetError>>,
    pub(crate) shutdown: Signal<Result<(), NetError>>,
    remote_settings: watch::Sender<H2Settings>,
    /// Non-owning index; the relay pins live records.
    streams: DashMap<StreamId, Weak<StreamRecord>>,
}

impl ConnectionRecord {
    /// `initial` seeds the remote settings snapshot until the peer sends its
    /// own.
    pub(crate) fn new(id: ConnectionId, initial: H2Settings) -> Self {
        let (remote_settings, _) = watch::channel(initial);
        Self {
            id,
            setup: Signal::new(),
            shutdown: Signal::new(),
            remote_settings,
            streams: DashMap::new(),
        }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn track_stream(&self, record: &Arc<StreamRecord>) {
        self.streams.insert(record.id(), Arc::downgrade(record));
    }

    pub(crate) fn forget_stream(&self, id: StreamId) {
        self.streams.remove(&id);
    }

    /// Streams that are still alive and not yet completed.
    pub(crate) fn open_streams(&self) -> usize {
        self.streams
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .upgrade()
                    .is_some_and(|record| !record.completion.is_resolved())
            })
            .count()
    }

    /// Why the connection is gone, once it is.
    pub(crate) fn closed_reason(&self) -> Option<NetError> {
        self.shutdown
            .get()
            .map(|outcome| outcome.err().unwrap_or(NetError::ConnectionClosed))
    }

    pub(crate) fn remote_settings(&self) -> H2Settings {
        *self.remote_settings.borrow()
    }

    pub(crate) fn subscribe_settings(&self) -> watch::Receiver<H2Settings> {
        self.remote_settings.subscribe()
    }

    /// Apply one relayed event. Returns the reason every live stream must be
    /// aborted with when the connection has gone away.
    pub(crate) fn apply(&self, event: ConnectionEvent) -> Option<NetError> {
        match event {
            ConnectionEvent::Setup(None) => {
                if self.setup.resolve(Ok(())) {
                    tracing::debug!(connection = %self.id, "connection established");
                }
                None
            }
            ConnectionEvent::Setup(Some(e)) => {
                // Shutdown first: a connect waiter that sees the failure must
                // also see a connection that needs no teardown.
                self.shutdown.resolve(Err(e));
                if self.setup.resolve(Err(e)) {
                    tracing::debug!(connection = %self.id, error = %e, "connection setup failed");
                }
                None
            }
            ConnectionEvent::Shutdown(reason) => {
                if self.shutdown.resolve(reason.map_or(Ok(()), Err)) {
                    match reason {
                        Some(e) => tracing::debug!(connection = %self.id, error = %e, "connection lost"),
                        None => tracing::debug!(connection = %self.id, "connection shut down"),
                    }
                }
                // Shutdown before setup fails the pending connect.
                self.setup
                    .resolve(Err(reason.unwrap_or(NetError::ConnectionClosed)));
                Some(reason.unwrap_or(NetError::ConnectionClosed))
            }
            ConnectionEvent::RemoteSettings(settings) => {
                tracing::trace!(connection = %self.id, count = settings.len(), "remote settings changed");
                self.remote_settings.send_modify(|current| current.apply(&settings));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::h2settings::{Setting, SettingId};

    fn record() -> ConnectionRecord {
        ConnectionRecord::new(ConnectionId::next(), H2Settings::default())
    }

    #[test]
    fn test_setup_then_shutdown() {
        let connection = record();
        assert_eq!(connection.apply(ConnectionEvent::Setup(None)), None);
        assert_eq!(connection.setup.get(), Some(Ok(())));

        let reason = connection.apply(ConnectionEvent::Shutdown(None));
        assert_eq!(reason, Some(NetError::ConnectionClosed));
        assert_eq!(connection.shutdown.get(), Some(Ok(())));
        // Setup keeps its first resolution.
        assert_eq!(connection.setup.get(), Some(Ok(())));
    }

    #[test]
    fn test_failed_setup_also_shuts_down() {
        let connection = record();
        connection.apply(ConnectionEvent::Setup(Some(NetError::ConnectionRefused)));
        assert_eq!(connection.setup.get(), Some(Err(NetError::ConnectionRefused)));
        assert_eq!(
            connection.shutdown.get(),
            Some(Err(NetError::ConnectionRefused))
        );
    }

    #[test]
    fn test_shutdown_before_setup_fails_setup() {
        let connection = record();
        connection.apply(ConnectionEvent::Shutdown(Some(NetError::ConnectionReset)));
        assert_eq!(connection.setup.get(), Some(Err(NetError::ConnectionReset)));
    }

    #[test]
    fn test_remote_settings_are_folded() {
        let connection = record();
        let mut rx = connection.subscribe_settings();
        connection.apply(ConnectionEvent::RemoteSettings(vec![Setting::new(
            SettingId::MaxConcurrentStreams,
            16,
        )]));
        assert!(rx.has_changed().unwrap());
        assert_eq!(connection.remote_settings().max_concurrent_streams, 16);
    }

    #[test]
    fn test_index_does_not_own_streams() {
        let connection = record();
        let stream = Arc::new(StreamRecord::new(StreamId::next()));
        connection.track_stream(&stream);
        assert_eq!(connection.open_streams(), 1);
        drop(stream);
        assert_eq!(connection.open_streams(), 0);
    }
}
