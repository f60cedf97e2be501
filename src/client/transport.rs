//! HTTP transport abstraction.
//!
//! The retry executor only talks to [`HttpTransport`]. Production code uses
//! [`ReqwestTransport`]; tests inject scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::ProxyConfig;
use crate::error::{Result, TransportError, TransportErrorKind};

/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.contextual.ai/v1";

/// HTTP method subset used by the agent API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Request body variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Single-file multipart upload under the `raw_file` field
    Multipart {
        file_name: String,
        bytes: Vec<u8>,
        metadata: Option<Value>,
    },
}

/// A transport-neutral request. `path` is relative to the API base.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// The JSON body, if any.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// A received HTTP response (any status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one HTTP attempt.
///
/// Implementations return `Ok` for every received response regardless of
/// status; `Err` means no status was received.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        request: &HttpRequest,
        api_key: &str,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct ReqwestTransport {
    api_base: String,
    client: Client,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl ReqwestTransport {
    /// Create a transport against `api_base` with the default timeout and no proxy.
    pub fn new(api_base: &str) -> Result<Self> {
        Self::with_options(api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS), None)
    }

    /// Create a transport with an explicit per-attempt timeout and optional proxy.
    pub fn with_options(
        api_base: &str,
        timeout: Duration,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(proxy) = proxy {
            let mut p = reqwest::Proxy::all(proxy.url())?;
            if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
                p = p.basic_auth(user, pass);
            }
            builder = builder.proxy(p);
        }
        Ok(Self::with_client(api_base, builder.build()?))
    }

    /// Create a transport with a custom reqwest client.
    pub fn with_client(api_base: &str, client: Client) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        api_key: &str,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let url = self.url(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Accept", "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart {
                file_name,
                bytes,
                metadata,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone());
                let mut form = reqwest::multipart::Form::new().part("raw_file", part);
                if let Some(meta) = metadata {
                    form = form.text("metadata", meta.to_string());
                }
                builder.multipart(form)
            }
        };

        debug!(method = request.method.as_str(), path = %request.path, "Sending request");

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse { status, body })
    }
}

/// Map a reqwest error onto a transport failure descriptor.
fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if lower.contains("dns") || lower.contains("resolve") {
        TransportErrorKind::Dns
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if lower.contains("reset") || lower.contains("broken pipe") {
        TransportErrorKind::Reset
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, message)
}
