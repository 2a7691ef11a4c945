//! # relaynet
//!
//! Async adapter for callback-driven native HTTP engines.
//!
//! A native engine does its work on its own threads and reports progress
//! through callbacks: a status code, a header block, body chunks, write
//! acknowledgements, a completion notice. `relaynet` relays those callbacks
//! onto the consumer's tokio runtime and exposes each exchange as an
//! awaitable [`Stream`].
//!
//! ## Features
//!
//! - **One relay per connection**: engine callbacks never block and are
//!   applied in arrival order by a single dispatcher task
//! - **HTTP/1.1 & HTTP/2**: single-exchange and multiplexed connections
//! - **Flow-controlled uploads**: at most one write in flight per stream,
//!   with the end of stream always signalled
//! - **Typed errors**: native integer codes become [`NetError`] values
//! - **Engines included**: a hyper-backed engine and a scripted engine for
//!   tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relaynet::{Connection, ConnectOptions, HttpRequest, HyperTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relaynet::NetError> {
//!     let engine = Arc::new(HyperTransport::new()?);
//!     let options = ConnectOptions::from_url("http://127.0.0.1:8080")?;
//!     let connection = Connection::connect(engine, options).await?;
//!
//!     let stream = connection.request(HttpRequest::get("/"))?;
//!     println!("Status: {}", stream.status().await?);
//!     while let Some(chunk) = stream.next_chunk().await {
//!         println!("{} bytes", chunk.len());
//!     }
//!     stream.wait_for_completion().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error codes and stream lifecycle
//! - [`relay`] - Callback sinks handed to engines
//! - [`http`] - Requests, streams and settings
//! - [`connection`] - Connection adapter
//! - [`transport`] - Native engine contract and bundled engines

pub mod base;
pub mod connection;
pub mod http;
pub mod relay;
pub mod transport;

pub use crate::base::neterror::NetError;
pub use crate::base::streamstate::StreamState;
pub use crate::connection::{ConnectOptions, Connection};
pub use crate::http::{H2Settings, HttpRequest, OrderedHeaderMap, RequestBody, Stream};
pub use crate::relay::{ConnectionSink, StreamSink};
pub use crate::transport::{
    ConnectionId, HyperTransport, NativeRequest, NativeTransport, ScriptedTransport, StreamId,
};
