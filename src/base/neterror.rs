use std::io;
use thiserror::Error;

/// Typed error surfaced by every adapter operation.
///
/// Native engines report failures as integer codes (Chromium's
/// `net_error_list.h` numbering); the relay converts them with
/// [`NetError::from`] exactly once, so nothing above the relay sees a raw code.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("Address invalid")]
    AddressInvalid,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("ALPN negotiation failed")]
    AlpnNegotiationFailed,
    #[error("Address in use")]
    AddressInUse,
    #[error("No buffer space")]
    NoBufferSpace,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Invalid chunked encoding")]
    InvalidChunkedEncoding,
    #[error("Method not supported")]
    MethodNotSupported,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response headers too big")]
    ResponseHeadersTooBig,
    #[error("Content-Length mismatch")]
    ContentLengthMismatch,
    #[error("HTTP/2 protocol error")]
    Http2ProtocolError,
    #[error("HTTP/2 server refused stream")]
    Http2ServerRefusedStream,
    #[error("HTTP/2 PING failed")]
    Http2PingFailed,
    #[error("Incomplete chunked encoding")]
    IncompleteChunkedEncoding,
    #[error("HTTP/2 flow control error")]
    Http2FlowControlError,
    #[error("HTTP/2 frame size error")]
    Http2FrameSizeError,
    #[error("HTTP/2 compression error")]
    Http2CompressionError,
    #[error("HTTP/1.1 required")]
    Http11Required,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,
    #[error("HTTP/2 RST_STREAM NO_ERROR received")]
    Http2RstStreamNoErrorReceived,
    #[error("HTTP/2 stream closed")]
    Http2StreamClosed,

    // Adapter errors (custom codes starting at -10000)
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Response body is not valid UTF-8")]
    InvalidUtf8,
    #[error("Response body is not valid JSON")]
    JsonParseError,
    #[error("Request body error")]
    RequestBodyError,
    #[error("Stream already closed")]
    StreamClosed,
    #[error("Write submitted after end of stream")]
    WriteAfterEndStream,
    #[error("Manual write mode not enabled for this stream")]
    ManualWriteDisabled,
    #[error("Operation requires a multiplexed (HTTP/2) connection")]
    MultiplexingRequired,
    #[error("Native transport contract violation: {0}")]
    ContractViolation(&'static str),

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

/// Native code reported for every [`NetError::ContractViolation`].
const CONTRACT_VIOLATION_CODE: i32 = -10008;

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::AddressInvalid => -108,
            NetError::AddressUnreachable => -109,
            NetError::SocketNotConnected => -112,
            NetError::ConnectionTimedOut => -118,
            NetError::AlpnNegotiationFailed => -122,
            NetError::AddressInUse => -147,
            NetError::NoBufferSpace => -176,

            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,
            NetError::InvalidResponse => -320,
            NetError::InvalidChunkedEncoding => -321,
            NetError::MethodNotSupported => -322,
            NetError::EmptyResponse => -324,
            NetError::ResponseHeadersTooBig => -325,
            NetError::Http2ProtocolError => -337,
            NetError::Http2ServerRefusedStream => -351,
            NetError::Http2PingFailed => -352,
            NetError::ContentLengthMismatch => -354,
            NetError::IncompleteChunkedEncoding => -355,
            NetError::Http2FlowControlError => -361,
            NetError::Http2FrameSizeError => -362,
            NetError::Http2CompressionError => -363,
            NetError::Http11Required => -365,
            NetError::InvalidHttpResponse => -370,
            NetError::Http2RstStreamNoErrorReceived => -372,
            NetError::Http2StreamClosed => -376,

            NetError::InvalidHeader => -10000,
            NetError::InvalidUtf8 => -10001,
            NetError::JsonParseError => -10002,
            NetError::RequestBodyError => -10003,
            NetError::StreamClosed => -10004,
            NetError::WriteAfterEndStream => -10005,
            NetError::ManualWriteDisabled => -10006,
            NetError::MultiplexingRequired => -10007,
            NetError::ContractViolation(_) => CONTRACT_VIOLATION_CODE,
            NetError::Unknown(code) => *code,
        }
    }

    /// Whether this error was raised by the adapter rather than reported by
    /// the native engine.
    pub fn is_internal(&self) -> bool {
        self.as_i32() <= -10000
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -108 => NetError::AddressInvalid,
            -109 => NetError::AddressUnreachable,
            -112 => NetError::SocketNotConnected,
            -118 => NetError::ConnectionTimedOut,
            -122 => NetError::AlpnNegotiationFailed,
            -147 => NetError::AddressInUse,
            -176 => NetError::NoBufferSpace,

            -300 => NetError::InvalidUrl,
            -302 => NetError::UnknownUrlScheme,
            -320 => NetError::InvalidResponse,
            -321 => NetError::InvalidChunkedEncoding,
            -322 => NetError::MethodNotSupported,
            -324 => NetError::EmptyResponse,
            -325 => NetError::ResponseHeadersTooBig,
            -337 => NetError::Http2ProtocolError,
            -351 => NetError::Http2ServerRefusedStream,
            -352 => NetError::Http2PingFailed,
            -354 => NetError::ContentLengthMismatch,
            -355 => NetError::IncompleteChunkedEncoding,
            -361 => NetError::Http2FlowControlError,
            -362 => NetError::Http2FrameSizeError,
            -363 => NetError::Http2CompressionError,
            -365 => NetError::Http11Required,
            -370 => NetError::InvalidHttpResponse,
            -372 => NetError::Http2RstStreamNoErrorReceived,
            -376 => NetError::Http2StreamClosed,

            -10000 => NetError::InvalidHeader,
            -10001 => NetError::InvalidUtf8,
            -10002 => NetError::JsonParseError,
            -10003 => NetError::RequestBodyError,
            -10004 => NetError::StreamClosed,
            -10005 => NetError::WriteAfterEndStream,
            -10006 => NetError::ManualWriteDisabled,
            -10007 => NetError::MultiplexingRequired,
            CONTRACT_VIOLATION_CODE => NetError::ContractViolation("reported by native engine"),
            _ => NetError::Unknown(code),
        }
    }
}

impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        NetError::from(&err)
    }
}

impl From<&io::Error> for NetError {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected => NetError::SocketNotConnected,
            io::ErrorKind::AddrInUse => NetError::AddressInUse,
            io::ErrorKind::AddrNotAvailable => NetError::AddressInvalid,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => {
                NetError::ConnectionClosed
            }
            _ => NetError::ConnectionFailed,
        }
    }
}
