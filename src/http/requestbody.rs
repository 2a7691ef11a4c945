//! Request body for POST/PUT operations.

use crate::base::neterror::NetError;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};

/// Fragment producer for a streamed body.
pub type BodyStream = BoxStream<'static, Result<Bytes, NetError>>;

/// Request body for HTTP methods that send data.
#[derive(Default)]
pub enum RequestBody {
    /// No body (GET, HEAD, DELETE).
    #[default]
    Empty,
    /// Body with raw bytes, handed to the engine with the request.
    Bytes(Bytes),
    /// Body pulled fragment by fragment and written with flow control.
    /// Requires a multiplexed connection.
    Stream(BodyStream),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Bytes(Bytes::from(s.to_owned()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl RequestBody {
    /// Streamed body from any fragment producer.
    pub fn stream<S, E>(producer: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<NetError>,
    {
        RequestBody::Stream(producer.map(|item| item.map_err(Into::into)).boxed())
    }

    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }

    /// Length in bytes, unknown for streamed bodies.
    pub fn len(&self) -> Option<usize> {
        match self {
            RequestBody::Empty => Some(0),
            RequestBody::Bytes(b) => Some(b.len()),
            RequestBody::Stream(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, RequestBody::Stream(_))
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body() {
        let body = RequestBody::Empty;
        assert!(body.is_empty());
        assert_eq!(body.len(), Some(0));
    }

    #[test]
    fn test_bytes_body() {
        let body = RequestBody::Bytes(Bytes::from("hello"));
        assert!(!body.is_empty());
        assert_eq!(body.len(), Some(5));
    }

    #[test]
    fn test_from_conversions() {
        let body: RequestBody = "hello world".to_string().into();
        assert_eq!(body.len(), Some(11));
        let body: RequestBody = vec![1u8, 2, 3, 4].into();
        assert_eq!(body.len(), Some(4));
        let body: RequestBody = Bytes::from_static(b"raw").into();
        assert_eq!(body.len(), Some(3));
    }

    #[test]
    fn test_stream_body_has_no_length() {
        let producer = futures::stream::iter(vec![Ok::<_, NetError>(Bytes::from("a"))]);
        let body = RequestBody::stream(producer);
        assert!(body.is_streaming());
        assert!(!body.is_empty());
        assert_eq!(body.len(), None);
        assert_eq!(format!("{:?}", body), "Stream(..)");
    }

    #[test]
    fn test_default_is_empty() {
        assert!(RequestBody::default().is_empty());
    }
}
