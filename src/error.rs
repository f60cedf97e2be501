//! Error types for the agent client
//!
//! Two layers, mirroring how the client reasons about failures:
//!
//! - [`ApiError`] is a classified upstream failure (HTTP status or transport
//!   failure). It knows whether it is retryable.
//! - [`ClientError`] is what every public operation returns. It adds local
//!   validation failures, response-shape failures, and the retry-exhaustion
//!   wrapper that keeps the last observed error intact.
//!
//! Every error maps to a stable snake_case kind via `kind()` so that host
//! applications can translate failures into their own messages.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Transport Failures
// ============================================================================

/// Coarse category of a transport-level failure (no HTTP status was received).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The attempt exceeded its per-attempt timeout
    Timeout,
    /// TCP/TLS connection could not be established
    Connect,
    /// Host name resolution failed
    Dns,
    /// Connection was reset or closed mid-request
    Reset,
    /// Anything else (request building, body decoding, ...)
    Other,
}

/// A transport-level failure descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connection failed",
            TransportErrorKind::Dns => "dns failure",
            TransportErrorKind::Reset => "connection reset",
            TransportErrorKind::Other => "transport error",
        };
        write!(f, "{}: {}", label, self.message)
    }
}

impl std::error::Error for TransportError {}

// ============================================================================
// Upstream Error Classification
// ============================================================================

/// Structured upstream failure.
///
/// The `String` payloads carry a truncated response body (never credentials).
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 / 422: malformed request or parameters
    BadRequest(String),
    /// 401: invalid or revoked API key
    Unauthorized(String),
    /// 403: key lacks access to the agent or datastore
    Forbidden(String),
    /// 404: agent, datastore or document does not exist
    NotFound(String),
    /// 429: rate limit or quota exceeded
    RateLimited(String),
    /// 5xx, including edge-proxy codes 520-524
    ServerError { status: u16, body: String },
    /// Any other non-2xx status
    Http { status: u16, body: String },
    /// No HTTP status was received
    Network(TransportError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            ApiError::ServerError { status, body } => {
                write!(f, "Server error (HTTP {}): {}", status, body)
            }
            ApiError::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            ApiError::Network(err) => write!(f, "Network failure: {}", err),
        }
    }
}

impl ApiError {
    /// Returns `true` if the failure is expected to be transient.
    ///
    /// Delegates to the pure classifier so there is a single source of truth.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(err) => crate::client::classifier::is_retryable_transport(err),
            other => other
                .status_code()
                .map(crate::client::classifier::is_retryable_status)
                .unwrap_or(false),
        }
    }

    /// Returns the HTTP status code associated with this error, if one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(_) => Some(400),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited(_) => Some(429),
            ApiError::ServerError { status, .. } | ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(_) => None,
        }
    }

    /// Stable error-kind identifier.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::RateLimited(_) => "rate_limited",
            ApiError::ServerError { .. } => "server_error",
            ApiError::Http { .. } => "http_error",
            ApiError::Network(_) => "network_failure",
        }
    }
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        ClientError::Api(err)
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// API key is empty, lacks the documented prefix, or is too short
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    /// Agent id is not a UUID
    #[error("Invalid agent id: {0}")]
    InvalidAgentId(String),

    /// Datastore id is not a UUID
    #[error("Invalid datastore id: {0}")]
    InvalidDatastoreId(String),

    /// Any other resource id (document, agent path parameter) is not a UUID
    #[error("Invalid resource id: {0}")]
    InvalidResourceId(String),

    /// Message is empty after sanitization or exceeds the length bound
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Structured-output schema is not a JSON-schema-shaped object
    #[error("Invalid structured output schema: {0}")]
    InvalidSchema(String),

    /// Required configuration value is missing
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// Classified upstream failure
    #[error("API error: {0}")]
    Api(ApiError),

    /// Retryable failures persisted through every attempt; `last` is the final one
    #[error("{last} (after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClientError>,
    },

    /// The retry loop ended without any attempt completing
    #[error("Maximum retries exceeded without a completed attempt")]
    MaxRetriesExceeded,

    /// 2xx body that is not valid JSON
    #[error("Invalid JSON response: {0}")]
    InvalidJsonResponse(String),

    /// Upstream returned an empty body or an empty answer field
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Valid JSON, but no recognized answer field
    #[error("Unrecognized response format: {0}")]
    UnrecognizedResponse(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// Stable snake_case error-kind identifier for host translation.
    ///
    /// A [`ClientError::RetriesExhausted`] reports the kind of the error it wraps.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::InvalidApiKey(_) => "invalid_api_key",
            ClientError::InvalidAgentId(_) => "invalid_agent_id",
            ClientError::InvalidDatastoreId(_) => "invalid_datastore_id",
            ClientError::InvalidResourceId(_) => "invalid_resource_id",
            ClientError::InvalidMessage(_) => "invalid_message",
            ClientError::InvalidSchema(_) => "invalid_schema",
            ClientError::MissingConfig(_) => "missing_config",
            ClientError::Api(err) => err.kind(),
            ClientError::RetriesExhausted { last, .. } => last.kind(),
            ClientError::MaxRetriesExceeded => "max_retries_exceeded",
            ClientError::InvalidJsonResponse(_) => "invalid_json_response",
            ClientError::EmptyResponse(_) => "empty_response",
            ClientError::UnrecognizedResponse(_) => "response_format_mismatch",
            ClientError::Io(_) => "io_error",
            ClientError::Json(_) => "invalid_json_response",
            ClientError::Http(_) => "network_failure",
        }
    }

    /// Returns `true` for local validation failures that never touch the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidApiKey(_)
                | ClientError::InvalidAgentId(_)
                | ClientError::InvalidDatastoreId(_)
                | ClientError::InvalidResourceId(_)
                | ClientError::InvalidMessage(_)
                | ClientError::InvalidSchema(_)
                | ClientError::MissingConfig(_)
        )
    }

    /// Number of attempts recorded on a retry-exhausted error.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ClientError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// The HTTP status behind this error, looking through the retry wrapper.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Api(err) => err.status_code(),
            ClientError::RetriesExhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
