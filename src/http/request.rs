//! Description of one exchange, before it is handed to a connection.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::{BodyStream, RequestBody};
use crate::transport::NativeRequest;
use http::Method;

/// Request builder.
///
/// Setters consume and return `self`. An invalid header is remembered and
/// reported when the request is submitted.
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    path: String,
    headers: OrderedHeaderMap,
    body: RequestBody,
    manual_write: bool,
    error: Option<NetError>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: OrderedHeaderMap::new(),
            body: RequestBody::Empty,
            manual_write: false,
            error: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Append a header, keeping insertion order.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Err(e) = self.headers.append(name, value) {
            self.error.get_or_insert(e);
        }
        self
    }

    pub fn headers(mut self, headers: OrderedHeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// The consumer will supply the body through `Stream::write` or
    /// `Stream::send_body`. Multiplexed connections only.
    pub fn manual_write(mut self) -> Self {
        self.manual_write = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_manual_write(&self) -> bool {
        self.manual_write
    }

    /// Whether the body reaches the engine through writes.
    pub fn needs_writes(&self) -> bool {
        self.manual_write || self.body.is_streaming()
    }

    /// Split into what the engine sees and the producer the adapter pumps.
    pub(crate) fn into_native(self) -> Result<(NativeRequest, Option<BodyStream>), NetError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let streaming_body = self.manual_write || self.body.is_streaming();
        let (body, producer) = match self.body {
            RequestBody::Empty => (None, None),
            RequestBody::Bytes(bytes) => (Some(bytes), None),
            RequestBody::Stream(producer) => (None, Some(producer)),
        };
        if self.manual_write && (body.is_some() || producer.is_some()) {
            // A manual-write request has exactly one body source.
            return Err(NetError::RequestBodyError);
        }
        let native = NativeRequest {
            method: self.method,
            path: self.path,
            headers: self.headers,
            body,
            streaming_body,
        };
        Ok((native, producer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_buffered_request() {
        let (native, producer) = HttpRequest::post("/upload")
            .header("content-type", "text/plain")
            .body("payload")
            .into_native()
            .unwrap();
        assert_eq!(native.method, Method::POST);
        assert_eq!(native.path, "/upload");
        assert_eq!(native.body, Some(Bytes::from_static(b"payload")));
        assert!(!native.streaming_body);
        assert!(producer.is_none());
    }

    #[test]
    fn test_header_order_is_kept() {
        let (native, _) = HttpRequest::get("/")
            .header("x-b", "2")
            .header("x-a", "1")
            .into_native()
            .unwrap();
        let names: Vec<_> = native.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["x-b", "x-a"]);
    }

    #[test]
    fn test_invalid_header_surfaces_on_submit() {
        let result = HttpRequest::get("/")
            .header("bad header", "v")
            .header("x-ok", "1")
            .into_native();
        assert_eq!(result.err().unwrap(), NetError::InvalidHeader);
    }

    #[test]
    fn test_streamed_body_needs_writes() {
        let producer = futures::stream::iter(vec![Ok::<_, NetError>(Bytes::from("x"))]);
        let request = HttpRequest::put("/").body(RequestBody::stream(producer));
        assert!(request.needs_writes());
        let (native, producer) = request.into_native().unwrap();
        assert!(native.streaming_body);
        assert!(native.body.is_none());
        assert!(producer.is_some());
    }

    #[test]
    fn test_manual_write_with_body_is_rejected() {
        let result = HttpRequest::post("/").body("x").manual_write().into_native();
        assert_eq!(result.err().unwrap(), NetError::RequestBodyError);
    }
}
