//! Native engine backed by hyper.
//!
//! Runs hyper's client connections (HTTP/1.1, or HTTP/2 with prior
//! knowledge) on a private multi-thread runtime and reports everything
//! through the sinks from that runtime's worker threads. From the adapter's
//! point of view it is indistinguishable from a foreign engine.

use super::body::{PendingWrite, WriteChannelBody};
use super::{ConnectionId, NativeRequest, NativeTransport, StreamId};
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::connection::ConnectOptions;
use crate::relay::{ConnectionSink, StreamSink};
use bytes::Bytes;
use dashmap::DashMap;
use http::header::HOST;
use http::{HeaderValue, Request, Response};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{mpsc, oneshot, Mutex};

type EngineBody = UnsyncBoxBody<Bytes, io::Error>;

/// Engine runtime configuration.
#[derive(Debug, Clone)]
pub struct HyperTransportConfig {
    /// Worker threads of the engine's private runtime.
    pub worker_threads: usize,
    /// Disable Nagle's algorithm on new sockets.
    pub tcp_nodelay: bool,
}

impl Default for HyperTransportConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            tcp_nodelay: true,
        }
    }
}

impl HyperTransportConfig {
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

#[derive(Clone)]
enum Sender {
    /// One exchange at a time.
    Http1(Arc<Mutex<http1::SendRequest<EngineBody>>>),
    Http2(http2::SendRequest<EngineBody>),
}

impl Sender {
    async fn send(&self, req: Request<EngineBody>) -> Result<Response<Incoming>, hyper::Error> {
        match self {
            Sender::Http1(sender) => {
                let mut sender = sender.lock().await;
                sender.ready().await?;
                sender.send_request(req).await
            }
            Sender::Http2(sender) => {
                let mut sender = sender.clone();
                sender.ready().await?;
                sender.send_request(req).await
            }
        }
    }

    fn is_multiplexed(&self) -> bool {
        matches!(self, Sender::Http2(_))
    }
}

struct NativeConnection {
    sender: Sender,
    authority: String,
    /// Cloned into every exchange task; the driver waits for all clones to
    /// drop before it reports shutdown.
    drain: mpsc::Sender<()>,
}

struct Writer {
    tx: mpsc::UnboundedSender<PendingWrite>,
    events: StreamSink,
}

#[derive(Default)]
struct Tables {
    connections: DashMap<ConnectionId, NativeConnection>,
    shutdowns: DashMap<ConnectionId, oneshot::Sender<()>>,
    writers: DashMap<StreamId, Writer>,
}

/// hyper-based [`NativeTransport`].
pub struct HyperTransport {
    runtime: Option<Runtime>,
    handle: Handle,
    config: HyperTransportConfig,
    tables: Arc<Tables>,
}

impl HyperTransport {
    pub fn new() -> Result<Self, NetError> {
        Self::with_config(HyperTransportConfig::default())
    }

    pub fn with_config(config: HyperTransportConfig) -> Result<Self, NetError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("relaynet-native")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            runtime: Some(runtime),
            handle,
            config,
            tables: Arc::new(Tables::default()),
        })
    }

    /// Connections currently established by this engine.
    pub fn connection_count(&self) -> usize {
        self.tables.connections.len()
    }
}

impl Drop for HyperTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl NativeTransport for HyperTransport {
    fn connect(&self, connection: ConnectionId, options: &ConnectOptions, events: ConnectionSink) {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.tables.shutdowns.insert(connection, shutdown_tx);

        let options = options.clone();
        let tables = self.tables.clone();
        let nodelay = self.config.tcp_nodelay;
        self.handle.spawn(async move {
            let established = tokio::select! {
                result = establish(&options, nodelay) => result,
                _ = &mut shutdown_rx => {
                    tracing::debug!(connection = %connection, "connect abandoned");
                    tables.shutdowns.remove(&connection);
                    events.on_shutdown(None);
                    return;
                }
            };

            match established {
                Ok((sender, driver)) => {
                    let (drain, drain_rx) = mpsc::channel(1);
                    tables.connections.insert(
                        connection,
                        NativeConnection {
                            sender,
                            authority: options.authority(),
                            drain,
                        },
                    );
                    events.on_setup(None);
                    run_driver(connection, driver, shutdown_rx, drain_rx, tables, events).await;
                }
                Err(e) => {
                    tables.shutdowns.remove(&connection);
                    events.on_setup(Some(e.as_i32()));
                }
            }
        });
    }

    fn activate(
        &self,
        connection: ConnectionId,
        stream: StreamId,
        request: NativeRequest,
        events: StreamSink,
    ) {
        let Some(native) = self.tables.connections.get(&connection) else {
            tracing::debug!(connection = %connection, stream = %stream, "activate on unknown connection");
            events.on_complete(Some(NetError::ConnectionClosed.as_i32()));
            return;
        };
        let sender = native.sender.clone();
        let authority = native.authority.clone();
        let drain = native.drain.clone();
        drop(native);

        let body: EngineBody = if request.streaming_body {
            let (tx, rx) = mpsc::unbounded_channel();
            self.tables.writers.insert(
                stream,
                Writer {
                    tx,
                    events: events.clone(),
                },
            );
            WriteChannelBody::new(rx, events.clone()).boxed_unsync()
        } else {
            match request.body.clone() {
                Some(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
                None => Empty::new().map_err(|never| match never {}).boxed_unsync(),
            }
        };

        let tables = self.tables.clone();
        self.handle.spawn(async move {
            let _drain = drain;
            let outcome = exchange(&sender, &authority, request, body, &events).await;
            tables.writers.remove(&stream);
            if let Err(e) = outcome {
                tracing::debug!(stream = %stream, error = %e, "exchange failed");
            }
            events.on_complete(outcome.err().map(|e| e.as_i32()));
        });
    }

    fn write(&self, stream: StreamId, data: Bytes, end_stream: bool) {
        let Some(writer) = self.tables.writers.get(&stream) else {
            // The exchange already finished; its completion settles the write.
            tracing::trace!(stream = %stream, "write for finished exchange");
            return;
        };
        let events = writer.events.clone();
        let sent = writer.tx.send(PendingWrite { data, end_stream }).is_ok();
        drop(writer);
        if !sent {
            events.on_write_complete(Some(NetError::ConnectionClosed.as_i32()));
        }
    }

    fn shutdown(&self, connection: ConnectionId) {
        match self.tables.shutdowns.remove(&connection) {
            Some((_, tx)) => {
                let _ = tx.send(());
            }
            None => tracing::trace!(connection = %connection, "shutdown of unknown connection"),
        }
    }
}

async fn establish(
    options: &ConnectOptions,
    nodelay: bool,
) -> Result<(Sender, ConnectionDriver), NetError> {
    let tcp = TcpStream::connect((options.host.as_str(), options.port))
        .await
        .connection_context(&options.host, options.port)?;
    if nodelay {
        tcp.set_nodelay(true)
            .connection_context(&options.host, options.port)?;
    }
    let io = TokioIo::new(tcp);

    if options.is_multiplexed() {
        let settings = &options.settings;
        let mut builder = http2::Builder::new(TokioExecutor::new());
        builder
            .initial_stream_window_size(settings.initial_window_size)
            .max_frame_size(settings.max_frame_size)
            .max_header_list_size(settings.max_header_list_size);
        let (sender, conn) = builder
            .handshake(io)
            .await
            .map_err(|e| map_hyper_error(&e))?;
        let driver: ConnectionDriver = Box::pin(conn);
        Ok((Sender::Http2(sender), driver))
    } else {
        let (sender, conn) = http1::handshake(io)
            .await
            .map_err(|e| map_hyper_error(&e))?;
        let driver: ConnectionDriver = Box::pin(conn);
        Ok((Sender::Http1(Arc::new(Mutex::new(sender))), driver))
    }
}

type ConnectionDriver =
    std::pin::Pin<Box<dyn Future<Output = Result<(), hyper::Error>> + Send + 'static>>;

async fn run_driver(
    connection: ConnectionId,
    driver: ConnectionDriver,
    shutdown_rx: oneshot::Receiver<()>,
    mut drain_rx: mpsc::Receiver<()>,
    tables: Arc<Tables>,
    events: ConnectionSink,
) {
    let reason = tokio::select! {
        result = driver => result.err().map(|e| map_hyper_error(&e)),
        _ = shutdown_rx => None,
    };

    tables.connections.remove(&connection);
    tables.shutdowns.remove(&connection);
    // Exchanges report completion before the connection reports shutdown.
    while drain_rx.recv().await.is_some() {}

    match reason {
        Some(e) => tracing::debug!(connection = %connection, error = %e, "connection lost"),
        None => tracing::debug!(connection = %connection, "connection closed"),
    }
    events.on_shutdown(reason.map(|e| e.as_i32()));
}

async fn exchange(
    sender: &Sender,
    authority: &str,
    request: NativeRequest,
    body: EngineBody,
    events: &StreamSink,
) -> Result<(), NetError> {
    let uri = if sender.is_multiplexed() {
        format!("http://{}{}", authority, request.path)
    } else {
        request.path.clone()
    };
    let mut req = Request::builder()
        .method(request.method)
        .uri(uri)
        .body(body)
        .map_err(|_| NetError::InvalidUrl)?;

    let headers = req.headers_mut();
    for (name, value) in request.headers.iter() {
        headers.append(name.clone(), value.clone());
    }
    if !sender.is_multiplexed() && !headers.contains_key(HOST) {
        let host = HeaderValue::from_str(authority).map_err(|_| NetError::InvalidUrl)?;
        headers.insert(HOST, host);
    }

    let response = sender.send(req).await.map_err(|e| map_hyper_error(&e))?;

    events.on_status(response.status().as_u16());
    events.on_headers(
        response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes())),
    );

    let mut body = response.into_body();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| map_hyper_error(&e))?;
        if let Ok(data) = frame.into_data() {
            events.on_chunk(data);
        }
    }
    Ok(())
}

fn map_hyper_error(err: &hyper::Error) -> NetError {
    if err.is_parse_too_large() {
        return NetError::ResponseHeadersTooBig;
    }
    if err.is_parse() || err.is_parse_status() {
        return NetError::InvalidHttpResponse;
    }
    if err.is_timeout() {
        return NetError::ConnectionTimedOut;
    }
    if err.is_canceled() || err.is_closed() || err.is_incomplete_message() {
        return NetError::ConnectionClosed;
    }
    if err.is_body_write_aborted() {
        return NetError::RequestBodyError;
    }

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return NetError::from(io_err);
        }
        source = cause.source();
    }
    NetError::ConnectionFailed
}
