//! A native engine driven by hand.
//!
//! [`ScriptedTransport`] performs no I/O. It records what the adapter asks
//! of it and hands the sinks to the caller, who fires callbacks from whatever
//! thread they like. Useful for exercising the adapter against exact callback
//! sequences, including ones a real engine would never produce.

use super::{ConnectionId, NativeRequest, NativeTransport, StreamId};
use crate::connection::ConnectOptions;
use crate::relay::{ConnectionSink, StreamSink};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// One `activate` call.
#[derive(Debug, Clone)]
pub struct Activation {
    pub connection: ConnectionId,
    pub stream: StreamId,
    pub request: NativeRequest,
    pub events: StreamSink,
}

/// One `write` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub stream: StreamId,
    pub data: Bytes,
    pub end_stream: bool,
}

#[derive(Debug, Clone, Copy)]
enum Setup {
    Manual,
    Auto(Option<i32>),
}

#[derive(Debug, Clone, Copy)]
enum WriteAcks {
    Manual,
    Auto(Option<i32>),
}

/// Scripted [`NativeTransport`].
///
/// By default connections are set up successfully and every write is
/// acknowledged, each from a separate OS thread.
pub struct ScriptedTransport {
    setup: Setup,
    write_acks: WriteAcks,
    connections: DashMap<ConnectionId, ConnectionSink>,
    last_connection: Mutex<Option<ConnectionSink>>,
    streams: DashMap<StreamId, StreamSink>,
    activations: Mutex<Vec<Activation>>,
    writes: Mutex<Vec<RecordedWrite>>,
    shutdowns: Mutex<Vec<ConnectionId>>,
    written: Notify,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            setup: Setup::Auto(None),
            write_acks: WriteAcks::Auto(None),
            connections: DashMap::new(),
            last_connection: Mutex::new(None),
            streams: DashMap::new(),
            activations: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            shutdowns: Mutex::new(Vec::new()),
            written: Notify::new(),
        }
    }

    /// Leave `on_setup` to the caller.
    pub fn manual_setup(mut self) -> Self {
        self.setup = Setup::Manual;
        self
    }

    /// Fail every connection attempt with a native error code.
    pub fn fail_setup(mut self, code: i32) -> Self {
        self.setup = Setup::Auto(Some(code));
        self
    }

    /// Leave `on_write_complete` to the caller.
    pub fn manual_write_acks(mut self) -> Self {
        self.write_acks = WriteAcks::Manual;
        self
    }

    /// Acknowledge every write with a native error code.
    pub fn fail_writes(mut self, code: i32) -> Self {
        self.write_acks = WriteAcks::Auto(Some(code));
        self
    }

    pub fn connection_sink(&self, connection: ConnectionId) -> Option<ConnectionSink> {
        self.connections.get(&connection).map(|sink| sink.clone())
    }

    /// Sink of the most recent `connect` call.
    pub fn last_connection(&self) -> Option<ConnectionSink> {
        lock(&self.last_connection).clone()
    }

    pub fn stream_sink(&self, stream: StreamId) -> Option<StreamSink> {
        self.streams.get(&stream).map(|sink| sink.clone())
    }

    pub fn activations(&self) -> Vec<Activation> {
        lock(&self.activations).clone()
    }

    pub fn last_activation(&self) -> Option<Activation> {
        lock(&self.activations).last().cloned()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        lock(&self.writes).clone()
    }

    pub fn writes_for(&self, stream: StreamId) -> Vec<RecordedWrite> {
        lock(&self.writes)
            .iter()
            .filter(|write| write.stream == stream)
            .cloned()
            .collect()
    }

    /// Wait until at least `count` writes have been recorded.
    pub async fn wait_for_writes(&self, count: usize) -> Vec<RecordedWrite> {
        loop {
            let notified = self.written.notified();
            {
                let writes = lock(&self.writes);
                if writes.len() >= count {
                    return writes.clone();
                }
            }
            notified.await;
        }
    }

    pub fn shutdowns(&self) -> Vec<ConnectionId> {
        lock(&self.shutdowns).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NativeTransport for ScriptedTransport {
    fn connect(&self, connection: ConnectionId, options: &ConnectOptions, events: ConnectionSink) {
        tracing::trace!(connection = %connection, host = %options.host, "scripted connect");
        self.connections.insert(connection, events.clone());
        *lock(&self.last_connection) = Some(events.clone());
        if let Setup::Auto(code) = self.setup {
            std::thread::spawn(move || events.on_setup(code));
        }
    }

    fn activate(
        &self,
        connection: ConnectionId,
        stream: StreamId,
        request: NativeRequest,
        events: StreamSink,
    ) {
        self.streams.insert(stream, events.clone());
        lock(&self.activations).push(Activation {
            connection,
            stream,
            request,
            events,
        });
    }

    fn write(&self, stream: StreamId, data: Bytes, end_stream: bool) {
        lock(&self.writes).push(RecordedWrite {
            stream,
            data,
            end_stream,
        });
        self.written.notify_waiters();

        if let WriteAcks::Auto(code) = self.write_acks {
            if let Some(events) = self.stream_sink(stream) {
                std::thread::spawn(move || events.on_write_complete(code));
            }
        }
    }

    fn shutdown(&self, connection: ConnectionId) {
        lock(&self.shutdowns).push(connection);
        if let Some((_, events)) = self.connections.remove(&connection) {
            std::thread::spawn(move || events.on_shutdown(None));
        }
    }
}
