use thiserror::Error;
use ErrorKind::*;

/// Coarse classification of a [`NetError`].
///
/// Calling code uses this to decide whether to retry, switch profile or
/// proxy, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The configured profile identifier is not registered.
    UnknownProfile,
    /// The transport endpoint could not be reached (DNS, TCP, proxy).
    Connect,
    /// TLS negotiation failed.
    Handshake,
    /// The server certificate failed trust validation.
    Certificate,
    /// Malformed or truncated response framing.
    Protocol,
    /// A deadline elapsed.
    Timeout,
    /// The call was dropped or aborted.
    Cancelled,
    /// The body does not match the requested representation.
    Decode,
    /// The request itself is invalid (bad URL, header, redirect, config).
    InvalidRequest,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Generic
    #[error("Operation aborted")]
    Aborted,
    #[error("Operation timed out")]
    TimedOut,

    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Tunnel connection failed")]
    TunnelConnectionFailed,
    #[error("SSL version or cipher mismatch")]
    SslVersionOrCipherMismatch,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("SOCKS connection failed")]
    SocksConnectionFailed,
    #[error("SOCKS connection host unreachable")]
    SocksConnectionHostUnreachable,
    #[error("ALPN negotiation failed")]
    AlpnNegotiationFailed,
    #[error("Proxy auth requested")]
    ProxyAuthRequested,
    #[error("Proxy connection failed")]
    ProxyConnectionFailed,

    // Certificate Errors
    #[error("Certificate common name invalid")]
    CertCommonNameInvalid,
    #[error("Certificate date invalid")]
    CertDateInvalid,
    #[error("Certificate authority invalid")]
    CertAuthorityInvalid,
    #[error("Certificate invalid")]
    CertInvalid,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid chunked encoding")]
    InvalidChunkedEncoding,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response headers too big")]
    ResponseHeadersTooBig,
    #[error("Content decoding failed")]
    ContentDecodingFailed,
    #[error("HTTP/2 protocol error")]
    Http2ProtocolError,
    #[error("HTTP/2 server refused stream")]
    Http2ServerRefusedStream,
    #[error("Content-Length mismatch")]
    ContentLengthMismatch,
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
    #[error("HTTP/2 stream closed")]
    Http2StreamClosed,

    // Crate-specific errors (custom codes starting at -900)
    #[error("Redirect cycle detected")]
    RedirectCycleDetected,
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
    #[error("Invalid header name or value")]
    InvalidHeader,
    #[error("Response body is not valid UTF-8")]
    InvalidUtf8,
    #[error("JSON decode failed: {0}")]
    JsonDecodeFailed(String),
    #[error("Connection went away (GOAWAY)")]
    Http2GoAway,
    #[error("TLS handshake reset by peer")]
    SslHandshakeReset,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read file: {0}")]
    FileReadFailed(String),

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

/// Every coded variant with its Chromium `net_error_list.h` number (crate
/// codes from -900) and its kind. Payload variants are listed with an empty
/// payload; only the discriminant is compared.
const CODES: &[(NetError, i32, ErrorKind)] = &[
    (NetError::Aborted, -3, Cancelled),
    (NetError::TimedOut, -7, Timeout),
    (NetError::ConnectionClosed, -100, Protocol),
    (NetError::ConnectionReset, -101, Protocol),
    (NetError::ConnectionRefused, -102, Connect),
    (NetError::ConnectionFailed, -104, Connect),
    (NetError::NameNotResolved, -105, Connect),
    (NetError::SslProtocolError, -107, Handshake),
    (NetError::AddressUnreachable, -109, Connect),
    (NetError::TunnelConnectionFailed, -111, Connect),
    (NetError::SslVersionOrCipherMismatch, -113, Handshake),
    (NetError::ConnectionTimedOut, -118, Timeout),
    (NetError::SocksConnectionFailed, -120, Connect),
    (NetError::SocksConnectionHostUnreachable, -121, Connect),
    (NetError::AlpnNegotiationFailed, -122, Handshake),
    (NetError::ProxyAuthRequested, -127, Connect),
    (NetError::ProxyConnectionFailed, -130, Connect),
    (NetError::CertCommonNameInvalid, -200, Certificate),
    (NetError::CertDateInvalid, -201, Certificate),
    (NetError::CertAuthorityInvalid, -202, Certificate),
    (NetError::CertInvalid, -207, Certificate),
    (NetError::InvalidUrl, -300, InvalidRequest),
    (NetError::DisallowedUrlScheme, -301, InvalidRequest),
    (NetError::UnknownUrlScheme, -302, InvalidRequest),
    (NetError::InvalidRedirect, -303, InvalidRequest),
    (NetError::TooManyRedirects, -310, InvalidRequest),
    (NetError::InvalidChunkedEncoding, -321, Protocol),
    (NetError::EmptyResponse, -324, Protocol),
    (NetError::ResponseHeadersTooBig, -325, Protocol),
    (NetError::ContentDecodingFailed, -330, Decode),
    (NetError::Http2ProtocolError, -337, Protocol),
    (NetError::Http2ServerRefusedStream, -351, Protocol),
    (NetError::ContentLengthMismatch, -354, Protocol),
    (NetError::IncompleteChunkedEncoding, -355, Protocol),
    (NetError::Http2FlowControlError, -361, Protocol),
    (NetError::Http2FrameSizeError, -362, Protocol),
    (NetError::Http2CompressionError, -363, Protocol),
    (NetError::Http11Required, -365, Handshake),
    (NetError::InvalidHttpResponse, -370, Protocol),
    (NetError::Http2StreamClosed, -376, Protocol),
    (NetError::RedirectCycleDetected, -900, InvalidRequest),
    (NetError::UnknownProfile(String::new()), -901, UnknownProfile),
    (NetError::InvalidHeader, -902, InvalidRequest),
    (NetError::InvalidUtf8, -903, Decode),
    (NetError::JsonDecodeFailed(String::new()), -904, Decode),
    (NetError::Http2GoAway, -905, Protocol),
    (NetError::SslHandshakeReset, -906, Handshake),
    (NetError::InvalidConfig(String::new()), -907, InvalidRequest),
    (NetError::FileReadFailed(String::new()), -908, InvalidRequest),
];

impl NetError {
    fn entry(&self) -> Option<&'static (NetError, i32, ErrorKind)> {
        let variant = std::mem::discriminant(self);
        CODES.iter().find(|(e, _, _)| std::mem::discriminant(e) == variant)
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Unknown(code) => *code,
            other => other.entry().map_or(0, |(_, code, _)| *code),
        }
    }

    /// Classify this error into one of the caller-visible kinds. Codes this
    /// crate does not know are treated as protocol failures.
    pub fn kind(&self) -> ErrorKind {
        self.entry().map_or(Protocol, |(_, _, kind)| *kind)
    }

    /// Whether the owning session must be closed after this error.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Handshake
                | ErrorKind::Certificate
                | ErrorKind::Protocol
                | ErrorKind::Timeout
                | ErrorKind::Cancelled
        )
    }

    /// Map an I/O error raised while establishing the transport.
    pub fn from_connect_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::ConnectionRefused => NetError::ConnectionRefused,
            Io::TimedOut => NetError::ConnectionTimedOut,
            Io::AddrNotAvailable => NetError::AddressUnreachable,
            _ => NetError::ConnectionFailed,
        }
    }
}

/// I/O errors raised on an established session.
impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        match err.kind() {
            Io::ConnectionReset | Io::BrokenPipe => NetError::ConnectionReset,
            Io::UnexpectedEof => NetError::ConnectionClosed,
            Io::TimedOut => NetError::TimedOut,
            Io::InvalidData => NetError::InvalidHttpResponse,
            _ => NetError::ConnectionClosed,
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        CODES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map_or(NetError::Unknown(code), |(e, _, _)| e.clone())
    }
}
