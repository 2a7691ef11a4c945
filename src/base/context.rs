//! Ergonomic error context helpers.
//!
//! Provides extension traits for converting IO errors into `NetError`
//! variants while logging where the failure happened.

use crate::base::neterror::NetError;
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Convert a connect-time IO error, logging the target endpoint.
    ///
    /// # Example
    /// ```ignore
    /// use relaynet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("example.com", 443)?;
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(host = %host, port, error = %e, "connection attempt failed");
            NetError::from(&e)
        })
    }
}
