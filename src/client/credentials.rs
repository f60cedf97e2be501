//! Credentials and the pre-flight validation gate.
//!
//! Validation is pure and runs before any network call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::CredentialStore;
use crate::error::{ClientError, Result};
use crate::utils::sanitize::redact_secret;

/// Documented API key prefix.
pub const API_KEY_PREFIX: &str = "key-";

/// Minimum API key length, prefix included.
pub const API_KEY_MIN_LEN: usize = 20;

static API_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^key-[A-Za-z0-9_\-]+$").expect("static regex"));

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static regex")
});

/// API credentials. Never mutated by the client once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub agent_id: String,
    pub datastore_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact_secret(&self.api_key))
            .field("agent_id", &self.agent_id)
            .field("datastore_id", &self.datastore_id)
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            agent_id: agent_id.into().trim().to_string(),
            datastore_id: None,
        }
    }

    pub fn with_datastore(mut self, datastore_id: impl Into<String>) -> Self {
        self.datastore_id = Some(datastore_id.into().trim().to_string());
        self
    }

    /// Read credentials from a store. Missing key or agent id is `MissingConfig`.
    pub fn from_store(store: &dyn CredentialStore) -> Result<Self> {
        let api_key = store
            .api_key()
            .ok_or_else(|| ClientError::MissingConfig("api_key".to_string()))?;
        let agent_id = store
            .agent_id()
            .ok_or_else(|| ClientError::MissingConfig("agent_id".to_string()))?;
        let mut creds = Self::new(api_key, agent_id);
        if let Some(ds) = store.datastore_id() {
            creds = creds.with_datastore(ds);
        }
        Ok(creds)
    }

    /// Validate every present field.
    pub fn validate(&self) -> Result<()> {
        validate_api_key(&self.api_key)?;
        validate_agent_id(&self.agent_id)?;
        if let Some(ds) = &self.datastore_id {
            validate_datastore_id(ds)?;
        }
        Ok(())
    }

    /// Redacted key for diagnostics.
    pub fn api_key_preview(&self) -> String {
        redact_secret(&self.api_key)
    }
}

/// Check an API key: non-empty, documented prefix, minimum length, safe charset.
pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(ClientError::InvalidApiKey("API key is empty".to_string()));
    }
    if !api_key.starts_with(API_KEY_PREFIX) {
        return Err(ClientError::InvalidApiKey(format!(
            "API key must start with '{}'",
            API_KEY_PREFIX
        )));
    }
    if api_key.len() < API_KEY_MIN_LEN {
        return Err(ClientError::InvalidApiKey(format!(
            "API key must be at least {} characters",
            API_KEY_MIN_LEN
        )));
    }
    if !API_KEY_RE.is_match(api_key) {
        return Err(ClientError::InvalidApiKey(
            "API key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Returns `true` for a canonical hyphenated UUID.
pub fn validate_uuid(id: &str) -> bool {
    UUID_RE.is_match(id)
}

pub fn validate_agent_id(agent_id: &str) -> Result<()> {
    if validate_uuid(agent_id) {
        Ok(())
    } else {
        Err(ClientError::InvalidAgentId(format!(
            "'{}' is not a UUID",
            agent_id
        )))
    }
}

pub fn validate_datastore_id(datastore_id: &str) -> Result<()> {
    if validate_uuid(datastore_id) {
        Ok(())
    } else {
        Err(ClientError::InvalidDatastoreId(format!(
            "'{}' is not a UUID",
            datastore_id
        )))
    }
}

/// Validate an id used as a path parameter (documents and such).
pub fn validate_resource_id(what: &str, id: &str) -> Result<()> {
    if validate_uuid(id) {
        Ok(())
    } else {
        Err(ClientError::InvalidResourceId(format!(
            "{} '{}' is not a UUID",
            what, id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const KEY: &str = "key-0123456789abcdefghij";
    const AGENT: &str = "0b3a6f8e-4c1d-4e2f-9a7b-5c6d7e8f9a0b";

    #[test]
    fn test_valid_credentials() {
        let creds = Credentials::new(KEY, AGENT);
        assert!(creds.validate().is_ok());
    }

    #[test]
    fn test_api_key_without_prefix() {
        let err = validate_api_key("sk-0123456789abcdefghij").unwrap_err();
        assert_eq!(err.kind(), "invalid_api_key");
    }

    #[test]
    fn test_api_key_too_short() {
        let err = validate_api_key("key-abc").unwrap_err();
        assert!(err.to_string().contains("at least"));
    }

    #[test]
    fn test_api_key_empty_and_bad_chars() {
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("key-0123456789 abcdefghij").is_err());
    }

    #[test]
    fn test_agent_id_must_be_uuid() {
        let creds = Credentials::new(KEY, "my-agent");
        assert_eq!(creds.validate().unwrap_err().kind(), "invalid_agent_id");
        assert!(validate_agent_id("0b3a6f8e4c1d4e2f9a7b5c6d7e8f9a0b").is_err());
        assert!(validate_agent_id(&AGENT.to_uppercase()).is_ok());
    }

    #[test]
    fn test_optional_datastore_validated_when_present() {
        let creds = Credentials::new(KEY, AGENT).with_datastore("not-a-uuid");
        assert_eq!(creds.validate().unwrap_err().kind(), "invalid_datastore_id");
    }

    #[test]
    fn test_constructor_trims() {
        let creds = Credentials::new(format!("  {} ", KEY), format!("{}\n", AGENT));
        assert_eq!(creds.api_key, KEY);
        assert_eq!(creds.agent_id, AGENT);
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = Credentials::new(KEY, AGENT);
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains(KEY));
        assert!(dbg.contains("key-01***"));
    }

    #[test]
    fn test_from_store_missing_values() {
        let config = Config::default();
        let err = Credentials::from_store(&config).unwrap_err();
        assert_eq!(err.kind(), "missing_config");

        let config = Config {
            api_key: Some(KEY.to_string()),
            ..Default::default()
        };
        let err = Credentials::from_store(&config).unwrap_err();
        assert!(err.to_string().contains("agent_id"));
    }

    #[test]
    fn test_from_store_reads_datastore() {
        let ds = "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f";
        let config = Config {
            api_key: Some(KEY.to_string()),
            agent_id: Some(AGENT.to_string()),
            datastore_id: Some(ds.to_string()),
            ..Default::default()
        };
        let creds = Credentials::from_store(&config).unwrap();
        assert_eq!(creds.datastore_id.as_deref(), Some(ds));
    }
}
