//! Redaction and input sanitization.
//!
//! Nothing that reaches a log line carries a full credential or an unbounded
//! response body.

/// Maximum characters of a response body kept for logs and error payloads.
pub const MAX_LOG_BODY_CHARS: usize = 200;

/// Maximum characters accepted in a user message.
pub const MAX_MESSAGE_CHARS: usize = 32_000;

/// Characters of a secret kept visible in redacted output.
const VISIBLE_SECRET_CHARS: usize = 6;

/// Redact a secret to a short prefix, e.g. `key-ab***`.
pub fn redact_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(empty)".to_string();
    }
    if secret.chars().count() <= VISIBLE_SECRET_CHARS {
        return "***".to_string();
    }
    let visible: String = secret.chars().take(VISIBLE_SECRET_CHARS).collect();
    format!("{}***", visible)
}

/// Truncate a body for logging, on a char boundary.
pub fn truncate_for_log(body: &str) -> String {
    let trimmed = body.trim();
    let total = trimmed.chars().count();
    if total <= MAX_LOG_BODY_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(MAX_LOG_BODY_CHARS).collect();
    format!("{}...[truncated, {} chars]", head, total)
}

/// Trim a user message and strip control characters other than newline and tab.
pub fn sanitize_message(message: &str) -> String {
    message
        .trim()
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
