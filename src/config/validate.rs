//! Configuration validation diagnostics.

use crate::client::credentials::{validate_api_key, validate_uuid};
use crate::config::{Config, CredentialStore};

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Validate a loaded config. Never touches the network.
pub fn validate_config(config: &Config) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    match config.api_key() {
        None => out.push(Diagnostic::new(DiagnosticLevel::Error, "api_key", "not set")),
        Some(key) => match validate_api_key(&key) {
            Ok(()) => out.push(Diagnostic::new(DiagnosticLevel::Ok, "api_key", "format valid")),
            Err(e) => out.push(Diagnostic::new(DiagnosticLevel::Error, "api_key", e.to_string())),
        },
    }

    match config.agent_id() {
        None => out.push(Diagnostic::new(DiagnosticLevel::Error, "agent_id", "not set")),
        Some(id) if validate_uuid(&id) => {
            out.push(Diagnostic::new(DiagnosticLevel::Ok, "agent_id", "format valid"))
        }
        Some(_) => out.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "agent_id",
            "not a UUID",
        )),
    }

    if let Some(id) = config.datastore_id() {
        if !validate_uuid(&id) {
            out.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "datastore_id",
                "not a UUID",
            ));
        }
    }

    if !config.api_base.starts_with("https://") && !config.api_base.starts_with("http://") {
        out.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "api_base",
            "must start with http:// or https://",
        ));
    } else if config.api_base.starts_with("http://") {
        out.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "api_base",
            "plain HTTP sends the API key unencrypted",
        ));
    }

    if config.timeout_secs == 0 {
        out.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.retry.max_retries < 0 {
        out.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "retry.max_retries",
            "negative value will be clamped to 0",
        ));
    } else if config.retry.max_retries > crate::client::backoff::MAX_RETRIES_CEILING as i64 {
        out.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "retry.max_retries",
            format!(
                "above maximum, will be lowered to {}",
                crate::client::backoff::MAX_RETRIES_CEILING
            ),
        ));
    }
    if config.retry.base_delay_secs < crate::client::backoff::MIN_BASE_DELAY_SECS {
        out.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "retry.base_delay_secs",
            format!(
                "below minimum, will be raised to {}",
                crate::client::backoff::MIN_BASE_DELAY_SECS
            ),
        ));
    } else if config.retry.base_delay_secs > crate::client::backoff::MAX_DELAY_CEILING_SECS {
        out.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "retry.base_delay_secs",
            format!(
                "above maximum, will be lowered to {}",
                crate::client::backoff::MAX_DELAY_CEILING_SECS
            ),
        ));
    }

    if config.cache.enabled && config.cache.max_entries == 0 {
        out.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "cache.max_entries",
            "0 with cache enabled stores nothing",
        ));
    }

    if let Some(proxy) = &config.proxy {
        if proxy.host.trim().is_empty() {
            out.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                "proxy.host",
                "empty, proxy will be ignored",
            ));
        }
        if proxy.username.is_some() != proxy.password.is_some() {
            out.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                "proxy",
                "username and password must both be set for proxy auth",
            ));
        }
    }

    out
}

/// Returns `true` if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
}
