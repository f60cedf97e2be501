//! Request and result types for the agent client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-call query options.
///
/// Use the builder pattern to construct options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Caller-minted session identifier (part of the cache key)
    pub session_id: Option<String>,
    /// Explicit conversation to continue; overrides the instance default
    pub conversation_id: Option<String>,
    /// Request an incremental (SSE) response. Never cached.
    pub stream: bool,
    /// JSON schema for structured output
    pub structured_output_schema: Option<Value>,
    /// Extra top-level body parameters passed through verbatim
    pub extra_params: Map<String, Value>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.structured_output_schema = Some(schema);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_params.insert(key.into(), value);
        self
    }
}

/// A validated query, ready to be turned into an upstream request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Sanitized message text
    pub message: String,
    pub options: QueryOptions,
}

/// A source attribution attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Always within `[0, 1]`
    pub relevance: f64,
}

/// The canonical, normalized query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl QueryResult {
    /// A successful result carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            message_id: None,
            conversation_id: None,
            session_id: None,
            citations: Vec::new(),
            usage: None,
            structured_data: None,
            model: None,
            created_at: None,
        }
    }

    pub fn has_citations(&self) -> bool {
        !self.citations.is_empty()
    }
}

/// Diagnostics from a connection test. Never contains the raw API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDiagnostics {
    pub api_key_preview: String,
    pub agent_id: String,
    pub api_base: String,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_preview: Option<String>,
}

/// Outcome of `test_connection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub diagnostics: ConnectionDiagnostics,
}
