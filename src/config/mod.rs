//! Configuration management for the agent client
//!
//! Configuration is loaded from `~/.agent-client/config.json` with environment
//! variable overrides. The client itself only reads credentials and proxy
//! settings through the [`CredentialStore`] trait.

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Read-only source of credentials and proxy settings.
///
/// Implemented by [`Config`]; hosts with their own settings storage implement
/// it directly.
pub trait CredentialStore: Send + Sync {
    fn api_key(&self) -> Option<String>;
    fn agent_id(&self) -> Option<String>;
    fn datastore_id(&self) -> Option<String>;
    fn proxy(&self) -> Option<ProxyConfig>;
}

impl CredentialStore for Config {
    fn api_key(&self) -> Option<String> {
        non_empty(&self.api_key)
    }

    fn agent_id(&self) -> Option<String> {
        non_empty(&self.agent_id)
    }

    fn datastore_id(&self) -> Option<String> {
        non_empty(&self.datastore_id)
    }

    fn proxy(&self) -> Option<ProxyConfig> {
        self.proxy.clone().filter(|p| !p.host.trim().is_empty())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Config {
    /// Returns the configuration directory path (~/.agent-client)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agent-client")
    }

    /// Returns the path to the config file (~/.agent-client/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (`AGENT_CLIENT_*`).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AGENT_CLIENT_API_KEY") {
            self.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_AGENT_ID") {
            self.agent_id = Some(val);
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_DATASTORE_ID") {
            self.datastore_id = Some(val);
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_API_BASE") {
            self.api_base = val;
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.timeout_secs = v;
            }
        }

        // Retry
        if let Ok(val) = std::env::var("AGENT_CLIENT_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                self.retry.max_retries = v;
            }
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_BASE_DELAY_SECS") {
            if let Ok(v) = val.parse() {
                self.retry.base_delay_secs = v;
            }
        }

        self.apply_proxy_env_overrides();
    }

    /// Apply proxy-specific environment variable overrides
    fn apply_proxy_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AGENT_CLIENT_PROXY_HOST") {
            self.proxy_mut().host = val;
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_PROXY_PORT") {
            if let Ok(v) = val.parse() {
                self.proxy_mut().port = v;
            }
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_PROXY_USERNAME") {
            self.proxy_mut().username = Some(val);
        }
        if let Ok(val) = std::env::var("AGENT_CLIENT_PROXY_PASSWORD") {
            self.proxy_mut().password = Some(val);
        }
    }

    fn proxy_mut(&mut self) -> &mut ProxyConfig {
        self.proxy.get_or_insert_with(|| ProxyConfig {
            host: String::new(),
            port: 8080,
            username: None,
            password: None,
        })
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
