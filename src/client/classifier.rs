//! Retryable-vs-fatal classification of upstream outcomes.
//!
//! Everything here is pure: no I/O and no hidden state.

use crate::error::{ApiError, TransportError, TransportErrorKind};

/// Status codes that indicate a transient upstream condition.
///
/// 520-524 are edge-proxy (CDN) codes for an unreachable or slow origin.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504, 520, 521, 522, 523, 524];

/// Substrings in a transport failure message that indicate a transient failure.
const RETRYABLE_TRANSPORT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "connect",
    "network",
    "reset",
    "broken pipe",
    "unavailable",
    "temporarily",
    "could not resolve",
    "dns",
];

/// Outcome of classifying one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Fatal,
}

/// Returns `true` if an HTTP status should be retried.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Returns `true` if a transport failure should be retried.
///
/// Known kinds decide directly; `Other` falls back to message matching.
pub fn is_retryable_transport(err: &TransportError) -> bool {
    match err.kind {
        TransportErrorKind::Timeout
        | TransportErrorKind::Connect
        | TransportErrorKind::Dns
        | TransportErrorKind::Reset => true,
        TransportErrorKind::Other => {
            contains_any(&err.message.to_lowercase(), RETRYABLE_TRANSPORT_PATTERNS)
        }
    }
}

/// Classify an already-structured [`ApiError`].
pub fn classify(err: &ApiError) -> Classification {
    if err.is_retryable() {
        Classification::Retryable
    } else {
        Classification::Fatal
    }
}

/// Map an HTTP status code and (truncated) body into a structured [`ApiError`].
pub fn parse_api_error(status: u16, body: &str) -> ApiError {
    match status {
        400 | 422 => ApiError::BadRequest(body.to_string()),
        401 => ApiError::Unauthorized(body.to_string()),
        403 => ApiError::Forbidden(body.to_string()),
        404 => ApiError::NotFound(body.to_string()),
        429 => ApiError::RateLimited(body.to_string()),
        500..=599 => ApiError::ServerError {
            status,
            body: body.to_string(),
        },
        _ => ApiError::Http {
            status,
            body: body.to_string(),
        },
    }
}

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}
