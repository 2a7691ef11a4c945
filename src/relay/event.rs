//! Events carried across the relay.

use crate::base::neterror::NetError;
use crate::http::h2settings::Setting;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::record::StreamRecord;
use crate::transport::StreamId;
use bytes::Bytes;
use std::sync::Arc;

/// One mutation of a Stream State Record. Errors are already typed.
#[derive(Debug)]
pub(crate) enum StreamEvent {
    Status(u16),
    Headers(Result<OrderedHeaderMap, NetError>),
    Chunk(Bytes),
    WriteComplete(Option<NetError>),
    Complete(Option<NetError>),
    /// Failure raised on the consumer side (e.g. a body producer error) or by
    /// the connection going away.
    Abort(NetError),
}

/// One mutation of a Connection Record.
#[derive(Debug)]
pub(crate) enum ConnectionEvent {
    Setup(Option<NetError>),
    Shutdown(Option<NetError>),
    RemoteSettings(Vec<Setting>),
}

pub(crate) enum RelayEvent {
    /// Start tracking a record. Always enqueued before the engine is asked to
    /// activate the stream, so it precedes every event for that stream.
    Attach(StreamId, Arc<StreamRecord>),
    Stream(StreamId, StreamEvent),
    Connection(ConnectionEvent),
}
