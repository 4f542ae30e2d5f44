use std::fmt;

use thiserror::Error;

use crate::core::request::ResponseBody;

/// Machine-readable codes for failures raised by the underlying transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorCode {
    /// Connection-level failure (DNS, refused connection, reset, broken body).
    NetworkError,
    /// The request target could not be turned into a valid URL.
    InvalidUrl,
    /// Anything else reported by the transport.
    UnexpectedError,
}

impl TransportErrorCode {
    /// Stable string form of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::InvalidUrl => "INVALID_URL",
            Self::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }
}

/// Machine-readable codes for failures detected on the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientErrorCode {
    /// The local deadline elapsed before a response arrived.
    TimeoutExceeded,
    /// A stream request answered 200 with a content type other than `text/event-stream`.
    SseInvalidContentType,
    /// No event or heartbeat arrived within the heartbeat period.
    SseHealthError,
    /// The server closed the stream without sending a terminal event.
    SseServerError,
    /// A success response whose body could not be decoded.
    ResponseDecodeError,
    /// A command could not be run by the entry point it was handed to.
    InvalidCommand,
    /// `start()` was called on a stream that is already running.
    StreamAlreadyStarted,
    /// A polling loop ran out of attempts.
    PollingMaxAttempts,
    /// A polling loop was cancelled by its caller.
    PollingCancelled,
}

impl ClientErrorCode {
    /// Stable string form of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeoutExceeded => "TIMEOUT_EXCEEDED",
            Self::SseInvalidContentType => "SSE_INVALID_CONTENT_TYPE",
            Self::SseHealthError => "SSE_HEALTH_ERROR",
            Self::SseServerError => "SSE_SERVER_ERROR",
            Self::ResponseDecodeError => "RESPONSE_DECODE_ERROR",
            Self::InvalidCommand => "INVALID_COMMAND",
            Self::StreamAlreadyStarted => "STREAM_ALREADY_STARTED",
            Self::PollingMaxAttempts => "POLLING_MAX_ATTEMPTS",
            Self::PollingCancelled => "POLLING_CANCELLED",
        }
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ClientErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three failure families a caller can discriminate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    Transport,
    Client,
    Http,
}

/// The primary error type for all fallible operations in this crate.
#[derive(Debug, Error)]
pub enum CcError {
    /// The transport failed before a response was obtained.
    #[error("transport error ({code}): {source}")]
    Transport {
        /// What kind of transport failure this is.
        code: TransportErrorCode,
        /// The underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A failure detected locally (deadline, protocol violation, bad input).
    #[error("client error ({code}): {message}")]
    Client {
        /// What kind of client failure this is.
        code: ClientErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// The server answered with a status code >= 400.
    #[error("HTTP error: status {status} at {url}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned the error.
        url: String,
        /// The decoded error body.
        body: ResponseBody,
    },
}

impl CcError {
    pub(crate) fn transport(
        code: TransportErrorCode,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            code,
            source: source.into(),
        }
    }

    pub(crate) fn client(code: ClientErrorCode, message: impl Into<String>) -> Self {
        Self::Client {
            code,
            message: message.into(),
        }
    }

    /// The family this error belongs to.
    pub fn family(&self) -> ErrorFamily {
        match self {
            Self::Transport { .. } => ErrorFamily::Transport,
            Self::Client { .. } => ErrorFamily::Client,
            Self::Http { .. } => ErrorFamily::Http,
        }
    }

    /// Machine-readable code. HTTP errors report `HTTP_ERROR`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { code, .. } => code.as_str(),
            Self::Client { code, .. } => code.as_str(),
            Self::Http { .. } => "HTTP_ERROR",
        }
    }

    /// The client code, if this is a client error.
    pub fn client_code(&self) -> Option<ClientErrorCode> {
        match self {
            Self::Client { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The transport code, if this is a transport error.
    pub fn transport_code(&self) -> Option<TransportErrorCode> {
        match self {
            Self::Transport { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The HTTP status, if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    pub fn is_timeout(&self) -> bool {
        self.client_code() == Some(ClientErrorCode::TimeoutExceeded)
    }
}

impl From<url::ParseError> for CcError {
    fn from(e: url::ParseError) -> Self {
        CcError::transport(TransportErrorCode::InvalidUrl, e)
    }
}

impl From<reqwest::Error> for CcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CcError::client(ClientErrorCode::TimeoutExceeded, e.to_string())
        } else if e.is_builder() {
            CcError::transport(TransportErrorCode::InvalidUrl, e)
        } else if e.is_connect() || e.is_request() || e.is_body() {
            CcError::transport(TransportErrorCode::NetworkError, e)
        } else {
            CcError::transport(TransportErrorCode::UnexpectedError, e)
        }
    }
}
