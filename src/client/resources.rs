//! Datastore, document and agent management.
//!
//! Every operation validates its ids, goes through the shared retry executor
//! and returns the upstream JSON. Nothing here touches the response cache.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ClientError, Result};

use super::credentials::validate_resource_id;
use super::transport::{HttpRequest, RequestBody};
use super::AgentClient;

/// Cursor pagination for list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

impl ListParams {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    fn apply(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(limit) = self.limit {
            request = request.with_query("limit", limit.to_string());
        }
        if let Some(cursor) = &self.cursor {
            request = request.with_query("cursor", cursor.clone());
        }
        request
    }
}

/// Parameters for creating an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub datastore_ids: Vec<String>,
}

impl NewAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

fn require_name(what: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClientError::InvalidMessage(format!("{} name is empty", what)));
    }
    Ok(name.to_string())
}

impl AgentClient {
    /// Datastore id from the argument, else from the credentials.
    fn datastore_or_default(&self, datastore_id: Option<&str>) -> Result<String> {
        let id = datastore_id
            .map(str::to_string)
            .or_else(|| self.credentials().datastore_id.clone())
            .ok_or_else(|| ClientError::MissingConfig("datastore_id".to_string()))?;
        super::credentials::validate_datastore_id(&id)?;
        Ok(id)
    }

    // ---- datastores ----

    pub async fn list_datastores(&self, params: &ListParams) -> Result<Value> {
        self.request_json(params.apply(HttpRequest::get("datastores")))
            .await
    }

    pub async fn get_datastore(&self, datastore_id: &str) -> Result<Value> {
        super::credentials::validate_datastore_id(datastore_id)?;
        self.request_json(HttpRequest::get(format!(
            "datastores/{}/metadata",
            datastore_id
        )))
        .await
    }

    pub async fn create_datastore(&self, name: &str) -> Result<Value> {
        let name = require_name("datastore", name)?;
        self.request_json(HttpRequest::post("datastores").with_json(json!({ "name": name })))
            .await
    }

    pub async fn delete_datastore(&self, datastore_id: &str) -> Result<Value> {
        super::credentials::validate_datastore_id(datastore_id)?;
        self.request_json(HttpRequest::delete(format!("datastores/{}", datastore_id)))
            .await
    }

    // ---- documents ----

    /// List documents in `datastore_id`, or the configured datastore.
    pub async fn list_documents(
        &self,
        datastore_id: Option<&str>,
        params: &ListParams,
    ) -> Result<Value> {
        let ds = self.datastore_or_default(datastore_id)?;
        self.request_json(params.apply(HttpRequest::get(format!(
            "datastores/{}/documents",
            ds
        ))))
        .await
    }

    /// Upload one file as a multipart `raw_file` part.
    pub async fn upload_document(
        &self,
        datastore_id: Option<&str>,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: Option<Value>,
    ) -> Result<Value> {
        let ds = self.datastore_or_default(datastore_id)?;
        if bytes.is_empty() {
            return Err(ClientError::InvalidMessage(format!(
                "document '{}' is empty",
                file_name
            )));
        }
        let request = HttpRequest::post(format!("datastores/{}/documents", ds)).with_body(
            RequestBody::Multipart {
                file_name: file_name.to_string(),
                bytes,
                metadata,
            },
        );
        self.request_json(request).await
    }

    pub async fn delete_document(
        &self,
        datastore_id: Option<&str>,
        document_id: &str,
    ) -> Result<Value> {
        let ds = self.datastore_or_default(datastore_id)?;
        validate_resource_id("document", document_id)?;
        self.request_json(HttpRequest::delete(format!(
            "datastores/{}/documents/{}",
            ds, document_id
        )))
        .await
    }

    // ---- agents ----

    pub async fn list_agents(&self, params: &ListParams) -> Result<Value> {
        self.request_json(params.apply(HttpRequest::get("agents")))
            .await
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Value> {
        validate_resource_id("agent", agent_id)?;
        self.request_json(HttpRequest::get(format!("agents/{}/metadata", agent_id)))
            .await
    }

    pub async fn create_agent(&self, agent: &NewAgent) -> Result<Value> {
        require_name("agent", &agent.name)?;
        for ds in &agent.datastore_ids {
            super::credentials::validate_datastore_id(ds)?;
        }
        let body = serde_json::to_value(agent)?;
        self.request_json(HttpRequest::post("agents").with_json(body))
            .await
    }

    pub async fn delete_agent(&self, agent_id: &str) -> Result<Value> {
        validate_resource_id("agent", agent_id)?;
        self.request_json(HttpRequest::delete(format!("agents/{}", agent_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::backoff::Sleeper;
    use crate::client::credentials::Credentials;
    use crate::client::transport::{HttpResponse, HttpTransport, Method};
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const KEY: &str = "key-0123456789abcdefghij";
    const AGENT: &str = "0b3a6f8e-4c1d-4e2f-9a7b-5c6d7e8f9a0b";
    const DS: &str = "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f";

    /// Replies from a script, recording each request.
    struct ScriptedTransport {
        replies: Mutex<Vec<HttpResponse>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(
            &self,
            request: &HttpRequest,
            _api_key: &str,
        ) -> std::result::Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok(HttpResponse::new(200, "{}"))
            } else {
                Ok(replies.remove(0))
            }
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn client(transport: Arc<ScriptedTransport>) -> AgentClient {
        AgentClient::new(Credentials::new(KEY, AGENT).with_datastore(DS), transport)
            .with_sleeper(Arc::new(NoSleep))
    }

    #[tokio::test]
    async fn test_list_datastores_with_pagination() {
        let transport = ScriptedTransport::new(vec![HttpResponse::new(
            200,
            r#"{"datastores":[{"id":"x"}],"next_cursor":"n"}"#,
        )]);
        let c = client(transport.clone());
        let value = c
            .list_datastores(&ListParams::default().with_limit(5).with_cursor("abc"))
            .await
            .unwrap();
        assert_eq!(value["next_cursor"], "n");

        let req = &transport.requests()[0];
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "datastores");
        assert_eq!(
            req.query,
            vec![
                ("limit".to_string(), "5".to_string()),
                ("cursor".to_string(), "abc".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_empty_body_is_null() {
        let transport = ScriptedTransport::new(vec![HttpResponse::new(204, "")]);
        let c = client(transport.clone());
        assert_eq!(c.delete_datastore(DS).await.unwrap(), Value::Null);
        assert_eq!(transport.requests()[0].method, Method::Delete);
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected_without_call() {
        let transport = ScriptedTransport::new(vec![]);
        let c = client(transport.clone());
        assert_eq!(
            c.get_datastore("nope").await.unwrap_err().kind(),
            "invalid_datastore_id"
        );
        assert_eq!(
            c.delete_document(None, "doc-1").await.unwrap_err().kind(),
            "invalid_resource_id"
        );
        assert_eq!(
            c.get_agent("x").await.unwrap_err().kind(),
            "invalid_resource_id"
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_documents_use_configured_datastore() {
        let transport = ScriptedTransport::new(vec![]);
        let c = client(transport.clone());
        c.list_documents(None, &ListParams::default()).await.unwrap();
        assert_eq!(
            transport.requests()[0].path,
            format!("datastores/{}/documents", DS)
        );
    }

    #[tokio::test]
    async fn test_documents_without_datastore_is_missing_config() {
        let transport = ScriptedTransport::new(vec![]);
        let c = AgentClient::new(Credentials::new(KEY, AGENT), transport.clone());
        let err = c
            .list_documents(None, &ListParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_config");
    }

    #[tokio::test]
    async fn test_upload_document_multipart() {
        let transport = ScriptedTransport::new(vec![HttpResponse::new(200, r#"{"id":"d1"}"#)]);
        let c = client(transport.clone());
        let value = c
            .upload_document(None, "notes.txt", b"hello".to_vec(), Some(json!({"tag": "a"})))
            .await
            .unwrap();
        assert_eq!(value["id"], "d1");
        match &transport.requests()[0].body {
            RequestBody::Multipart {
                file_name,
                bytes,
                metadata,
            } => {
                assert_eq!(file_name, "notes.txt");
                assert_eq!(bytes, b"hello");
                assert_eq!(metadata.as_ref().unwrap()["tag"], "a");
            }
            other => panic!("expected multipart, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_empty_file_rejected() {
        let transport = ScriptedTransport::new(vec![]);
        let c = client(transport.clone());
        assert!(c.upload_document(None, "a.txt", vec![], None).await.is_err());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_create_agent_body() {
        let transport = ScriptedTransport::new(vec![HttpResponse::new(201, r#"{"id":"a"}"#)]);
        let c = client(transport.clone());
        let mut agent = NewAgent::new("Support bot");
        agent.datastore_ids.push(DS.to_string());
        c.create_agent(&agent).await.unwrap();

        let body = transport.requests()[0].json().cloned().unwrap();
        assert_eq!(body, json!({"name": "Support bot", "datastore_ids": [DS]}));
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let transport = ScriptedTransport::new(vec![]);
        let c = client(transport.clone());
        assert!(c.create_datastore("  ").await.is_err());
        assert!(c.create_agent(&NewAgent::new("")).await.is_err());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_resource_calls_share_retry() {
        let transport = ScriptedTransport::new(vec![
            HttpResponse::new(503, "busy"),
            HttpResponse::new(200, r#"{"agents":[]}"#),
        ]);
        let c = client(transport.clone());
        let value = c.list_agents(&ListParams::default()).await.unwrap();
        assert_eq!(value["agents"], json!([]));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_non_json_success_body() {
        let transport = ScriptedTransport::new(vec![HttpResponse::new(200, "ok")]);
        let c = client(transport);
        assert_eq!(
            c.get_agent(AGENT).await.unwrap_err().kind(),
            "invalid_json_response"
        );
    }
}
