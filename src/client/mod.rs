//! The agent client facade.
//!
//! [`AgentClient`] composes validation, the response cache, conversation
//! tracking, the retry executor and the response normalizer:
//!
//! ```text
//! validate -> cache lookup -> build request -> retry executor -> normalize -> cache store
//! ```
//!
//! Resource operations (datastores, documents, agents) live in [`resources`]
//! and share the executor but skip the cache.

pub mod backoff;
pub mod blocking;
pub mod cache;
pub mod classifier;
pub mod conversation;
pub mod credentials;
pub mod normalize;
pub mod resources;
pub mod retry;
pub mod transport;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};

use crate::config::{Config, CredentialStore};
use crate::error::{ClientError, Result};
use crate::log_component;
use crate::utils::sanitize::{sanitize_message, truncate_for_log, MAX_MESSAGE_CHARS};

pub use backoff::{BackoffScheduler, Sleeper, TokioSleeper};
pub use cache::ResponseCache;
pub use conversation::ConversationState;
pub use credentials::Credentials;
pub use retry::{AttemptOutcome, RetryAttempt, RetryExecutor};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{
    Citation, ConnectionDiagnostics, ConnectionReport, QueryOptions, QueryRequest, QueryResult,
};

/// Body keys owned by the client; extra params never override them.
pub const RESERVED_PARAMS: &[&str] = &[
    "messages",
    "stream",
    "conversation_id",
    "session_id",
    "structured_output",
];

/// Message sent by `test_connection`.
pub const CONNECTION_TEST_MESSAGE: &str = "Hello, this is a connection test.";

/// Resilient client for the agent API.
pub struct AgentClient {
    credentials: Credentials,
    api_base: String,
    timeout: Duration,
    executor: RetryExecutor,
    cache: ResponseCache,
    cache_enabled: bool,
    conversation: ConversationState,
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("credentials", &self.credentials)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("executor", &self.executor)
            .field("cache", &self.cache)
            .field("cache_enabled", &self.cache_enabled)
            .field("conversation", &self.conversation)
            .finish()
    }
}

impl AgentClient {
    /// Create a client with explicit credentials and an injected transport.
    ///
    /// Credentials are validated on each call, not here.
    pub fn new(credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            api_base: transport::DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(transport::DEFAULT_TIMEOUT_SECS),
            executor: RetryExecutor::new(transport),
            cache: ResponseCache::default(),
            cache_enabled: true,
            conversation: ConversationState::new(),
        }
    }

    /// Build a reqwest-backed client from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = Credentials::from_store(config)?;
        Self::from_config_with(config, credentials)
    }

    /// Like [`from_config`](Self::from_config), but with caller-supplied
    /// credentials. Transport, retry and cache settings still come from `config`.
    pub fn from_config_with(config: &Config, credentials: Credentials) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let proxy = CredentialStore::proxy(config);
        let transport = ReqwestTransport::with_options(&config.api_base, timeout, proxy.as_ref())?;
        let scheduler = BackoffScheduler::new(config.retry.max_retries, config.retry.base_delay_secs)
            .with_max_delay_secs(config.retry.max_delay_secs);

        let mut client = Self::new(credentials, Arc::new(transport))
            .with_api_base(transport_base(&config.api_base))
            .with_timeout(timeout)
            .with_scheduler(scheduler)
            .with_cache(ResponseCache::new(
                Duration::from_secs(config.cache.ttl_secs),
                config.cache.max_entries,
            ));
        client.cache_enabled = config.cache.enabled;
        Ok(client)
    }

    /// Build a reqwest-backed client against the default API base, reading
    /// credentials and proxy settings once from `store`.
    pub fn from_store(store: &dyn CredentialStore) -> Result<Self> {
        let credentials = Credentials::from_store(store)?;
        let timeout = Duration::from_secs(transport::DEFAULT_TIMEOUT_SECS);
        let proxy = store.proxy();
        let transport =
            ReqwestTransport::with_options(transport::DEFAULT_API_BASE, timeout, proxy.as_ref())?;
        Ok(Self::new(credentials, Arc::new(transport)))
    }

    /// Set the API base reported in diagnostics.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Per-attempt timeout used for the worst-case latency bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_scheduler(mut self, scheduler: BackoffScheduler) -> Self {
        self.executor.set_scheduler(scheduler);
        self
    }

    /// Replace the wait primitive used between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.executor = self.executor.with_sleeper(sleeper);
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    /// Disable (or re-enable) response caching.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &BackoffScheduler {
        self.executor.scheduler()
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    // ------------------------------------------------------------------
    // Configuration mutators
    // ------------------------------------------------------------------

    /// Change the retry policy. Inputs are sanitized (see [`BackoffScheduler::new`]).
    pub fn set_retry_config(&mut self, max_retries: i64, base_delay_secs: f64) {
        let max_delay = self.executor.scheduler().max_delay_secs();
        self.executor.set_scheduler(
            BackoffScheduler::new(max_retries, base_delay_secs).with_max_delay_secs(max_delay),
        );
    }

    /// Replace the API key and agent id on this instance.
    ///
    /// Clears the response cache. Prefer [`with_credentials`](Self::with_credentials)
    /// when the override must not affect other callers.
    pub fn set_credentials(&mut self, api_key: impl Into<String>, agent_id: impl Into<String>) {
        let datastore_id = self.credentials.datastore_id.take();
        self.credentials = Credentials {
            datastore_id,
            ..Credentials::new(api_key, agent_id)
        };
        self.cache.clear();
    }

    /// Copy of this client with other credentials and an empty cache.
    ///
    /// Shares the transport and retry policy; conversation state is not copied.
    pub fn with_credentials(&self, credentials: Credentials) -> Self {
        Self {
            credentials,
            api_base: self.api_base.clone(),
            timeout: self.timeout,
            executor: self.executor.clone(),
            cache: ResponseCache::new(self.cache.ttl(), self.cache.max_entries()),
            cache_enabled: self.cache_enabled,
            conversation: ConversationState::new(),
        }
    }

    pub fn start_new_conversation(&mut self) {
        self.conversation.start_new();
    }

    pub fn set_conversation_id(&mut self, conversation_id: impl Into<String>) {
        self.conversation
            .set_conversation_id(Some(conversation_id.into()));
    }

    pub fn set_multi_turn_behavior(&mut self, enabled: bool) {
        self.conversation.set_multi_turn(enabled);
    }

    /// Upper bound on one `query` call: every attempt times out and every
    /// retry waits the longest jittered delay.
    pub fn worst_case_latency(&self) -> Duration {
        self.executor.scheduler().worst_case_total(self.timeout)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Send `message` to the agent and return the normalized result.
    pub async fn query(&self, message: &str, options: QueryOptions) -> Result<QueryResult> {
        self.credentials.validate()?;
        let request = prepare_request(message, options)?;

        // Schema and passthrough params change the upstream reply but are not
        // part of the fingerprint, so those requests bypass the cache.
        let cacheable = self.cache_enabled
            && !request.options.stream
            && request.options.structured_output_schema.is_none()
            && request.options.extra_params.is_empty();
        let cache_key = cacheable.then(|| {
            ResponseCache::fingerprint(
                &self.credentials.agent_id,
                &request.message,
                request.options.session_id.as_deref(),
            )
        });

        if let Some(key) = &cache_key {
            if let Some(hit) = self.cache.get(key) {
                log_component!(debug, "cache", "Response cache hit", agent_id = %self.credentials.agent_id);
                return Ok(hit);
            }
        }

        let http = self.build_query_request(&request);
        log_component!(
            debug,
            "query",
            "Sending query",
            agent_id = %self.credentials.agent_id,
            api_key = %self.credentials.api_key_preview(),
            chars = request.message.chars().count(),
            stream = request.options.stream
        );

        let response = self
            .executor
            .execute(&http, &self.credentials.api_key)
            .await?;

        let mut result = if request.options.stream {
            normalize::normalize_stream_body(&response.body)?
        } else {
            normalize::normalize_body(&response.body)?
        };

        if request.options.structured_output_schema.is_some() && result.structured_data.is_none() {
            result.structured_data = parse_structured_text(&result.text);
        }
        if result.session_id.is_none() {
            result.session_id = request.options.session_id.clone();
        }

        if let Some(key) = cache_key {
            self.cache.put(&key, result.clone());
        }
        Ok(result)
    }

    /// Like [`query`](Self::query), minting a session id when none is given.
    pub async fn send_message(&self, message: &str, options: QueryOptions) -> Result<QueryResult> {
        let options = if options.session_id.is_some() {
            options
        } else {
            options.with_session_id(uuid::Uuid::new_v4().to_string())
        };
        self.query(message, options).await
    }

    /// Issue one diagnostic query without retries or caching.
    pub async fn test_connection(&self) -> ConnectionReport {
        let started = Instant::now();
        let mut diagnostics = ConnectionDiagnostics {
            api_key_preview: self.credentials.api_key_preview(),
            agent_id: self.credentials.agent_id.clone(),
            api_base: self.api_base.clone(),
            elapsed_ms: 0,
            status_code: None,
            error_kind: None,
            error: None,
            response_preview: None,
        };

        let outcome = self.run_connection_test().await;
        diagnostics.elapsed_ms = started.elapsed().as_millis() as u64;

        let success = match outcome {
            Ok((status, body)) => {
                diagnostics.status_code = Some(status);
                diagnostics.response_preview = Some(truncate_for_log(&body));
                match normalize::normalize_body(&body) {
                    Ok(_) => true,
                    Err(e) => {
                        diagnostics.error_kind = Some(e.kind().to_string());
                        diagnostics.error = Some(e.to_string());
                        false
                    }
                }
            }
            Err(e) => {
                diagnostics.status_code = e.status_code();
                diagnostics.error_kind = Some(e.kind().to_string());
                diagnostics.error = Some(e.to_string());
                false
            }
        };

        if success {
            log_component!(info, "query", "Connection test succeeded", elapsed_ms = diagnostics.elapsed_ms);
        } else {
            log_component!(
                warn,
                "query",
                "Connection test failed",
                elapsed_ms = diagnostics.elapsed_ms,
                error_kind = ?diagnostics.error_kind
            );
        }
        ConnectionReport {
            success,
            diagnostics,
        }
    }

    /// Connection test with override credentials. This instance is untouched.
    pub async fn test_connection_with(&self, credentials: Credentials) -> ConnectionReport {
        self.with_credentials(credentials).test_connection().await
    }

    async fn run_connection_test(&self) -> Result<(u16, String)> {
        self.credentials.validate()?;
        let request = prepare_request(CONNECTION_TEST_MESSAGE, QueryOptions::new())?;
        let http = self.build_query_request(&request);
        let single = self.executor.clone().with_scheduler(BackoffScheduler::new(
            0,
            self.executor.scheduler().base_delay_secs(),
        ));
        let response = single.execute(&http, &self.credentials.api_key).await?;
        Ok((response.status, response.body))
    }

    /// Upstream request for a validated query.
    pub fn build_query_request(&self, request: &QueryRequest) -> HttpRequest {
        let options = &request.options;
        let mut body = Map::new();
        body.insert(
            "messages".to_string(),
            json!([{ "role": "user", "content": request.message }]),
        );
        body.insert("stream".to_string(), Value::Bool(options.stream));
        if let Some(conversation_id) = self
            .conversation
            .resolve(options.conversation_id.as_deref())
        {
            body.insert("conversation_id".to_string(), Value::String(conversation_id));
        }
        if let Some(session_id) = &options.session_id {
            body.insert("session_id".to_string(), Value::String(session_id.clone()));
        }
        if let Some(schema) = &options.structured_output_schema {
            body.insert(
                "structured_output".to_string(),
                json!({ "type": "JSON", "json_schema": schema }),
            );
        }
        for (key, value) in &options.extra_params {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                log_component!(debug, "query", "Ignoring reserved extra parameter", key = %key);
                continue;
            }
            body.insert(key.clone(), value.clone());
        }

        HttpRequest::post(format!("agents/{}/query", self.credentials.agent_id))
            .with_json(Value::Object(body))
    }

    /// Execute a non-query request and parse its JSON body.
    ///
    /// An empty 2xx body is `Value::Null`.
    pub(crate) async fn request_json(&self, request: HttpRequest) -> Result<Value> {
        credentials::validate_api_key(&self.credentials.api_key)?;
        log_component!(
            debug,
            "resources",
            "Sending resource request",
            method = request.method.as_str(),
            path = %request.path
        );
        let response = self
            .executor
            .execute(&request, &self.credentials.api_key)
            .await?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| {
            ClientError::InvalidJsonResponse(format!("{}: {}", e, truncate_for_log(&response.body)))
        })
    }
}

/// Sanitize the message and check options. Pure.
pub fn prepare_request(message: &str, options: QueryOptions) -> Result<QueryRequest> {
    let message = sanitize_message(message);
    if message.is_empty() {
        return Err(ClientError::InvalidMessage(
            "message is empty".to_string(),
        ));
    }
    let chars = message.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(ClientError::InvalidMessage(format!(
            "message is {} characters, maximum is {}",
            chars, MAX_MESSAGE_CHARS
        )));
    }
    if let Some(schema) = &options.structured_output_schema {
        validate_schema(schema)?;
    }
    Ok(QueryRequest { message, options })
}

/// A structured-output schema must be an object with `type` or `properties`.
pub fn validate_schema(schema: &Value) -> Result<()> {
    let Some(obj) = schema.as_object() else {
        return Err(ClientError::InvalidSchema(
            "schema must be a JSON object".to_string(),
        ));
    };
    if !obj.contains_key("type") && !obj.contains_key("properties") {
        return Err(ClientError::InvalidSchema(
            "schema needs a 'type' or 'properties' key".to_string(),
        ));
    }
    Ok(())
}

/// Answer text that is itself a JSON object or array.
fn parse_structured_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

fn transport_base(api_base: &str) -> String {
    api_base.trim_end_matches('/').to_string()
}
