//! Synchronous wrapper around [`AgentClient`].
//!
//! Each call blocks the calling thread until it is terminal, retries and
//! backoff waits included. Must not be used from inside a tokio runtime.

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::config::Config;
use crate::error::Result;

use super::resources::{ListParams, NewAgent};
use super::types::{ConnectionReport, QueryOptions, QueryResult};
use super::{AgentClient, Credentials};

/// Blocking agent client backed by a current-thread runtime.
#[derive(Debug)]
pub struct BlockingAgentClient {
    inner: AgentClient,
    runtime: Runtime,
}

impl BlockingAgentClient {
    pub fn new(inner: AgentClient) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { inner, runtime })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(AgentClient::from_config(config)?)
    }

    pub fn inner(&self) -> &AgentClient {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut AgentClient {
        &mut self.inner
    }

    pub fn query(&self, message: &str, options: QueryOptions) -> Result<QueryResult> {
        self.runtime.block_on(self.inner.query(message, options))
    }

    pub fn send_message(&self, message: &str, options: QueryOptions) -> Result<QueryResult> {
        self.runtime
            .block_on(self.inner.send_message(message, options))
    }

    pub fn test_connection(&self) -> ConnectionReport {
        self.runtime.block_on(self.inner.test_connection())
    }

    pub fn test_connection_with(&self, credentials: Credentials) -> ConnectionReport {
        self.runtime
            .block_on(self.inner.test_connection_with(credentials))
    }

    pub fn set_retry_config(&mut self, max_retries: i64, base_delay_secs: f64) {
        self.inner.set_retry_config(max_retries, base_delay_secs);
    }

    pub fn set_credentials(&mut self, api_key: impl Into<String>, agent_id: impl Into<String>) {
        self.inner.set_credentials(api_key, agent_id);
    }

    pub fn start_new_conversation(&mut self) {
        self.inner.start_new_conversation();
    }

    pub fn set_conversation_id(&mut self, conversation_id: impl Into<String>) {
        self.inner.set_conversation_id(conversation_id);
    }

    pub fn set_multi_turn_behavior(&mut self, enabled: bool) {
        self.inner.set_multi_turn_behavior(enabled);
    }

    pub fn list_datastores(&self, params: &ListParams) -> Result<Value> {
        self.runtime.block_on(self.inner.list_datastores(params))
    }

    pub fn get_datastore(&self, datastore_id: &str) -> Result<Value> {
        self.runtime.block_on(self.inner.get_datastore(datastore_id))
    }

    pub fn create_datastore(&self, name: &str) -> Result<Value> {
        self.runtime.block_on(self.inner.create_datastore(name))
    }

    pub fn delete_datastore(&self, datastore_id: &str) -> Result<Value> {
        self.runtime
            .block_on(self.inner.delete_datastore(datastore_id))
    }

    pub fn list_documents(&self, datastore_id: Option<&str>, params: &ListParams) -> Result<Value> {
        self.runtime
            .block_on(self.inner.list_documents(datastore_id, params))
    }

    pub fn upload_document(
        &self,
        datastore_id: Option<&str>,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: Option<Value>,
    ) -> Result<Value> {
        self.runtime.block_on(
            self.inner
                .upload_document(datastore_id, file_name, bytes, metadata),
        )
    }

    pub fn delete_document(&self, datastore_id: Option<&str>, document_id: &str) -> Result<Value> {
        self.runtime
            .block_on(self.inner.delete_document(datastore_id, document_id))
    }

    pub fn list_agents(&self, params: &ListParams) -> Result<Value> {
        self.runtime.block_on(self.inner.list_agents(params))
    }

    pub fn get_agent(&self, agent_id: &str) -> Result<Value> {
        self.runtime.block_on(self.inner.get_agent(agent_id))
    }

    pub fn create_agent(&self, agent: &NewAgent) -> Result<Value> {
        self.runtime.block_on(self.inner.create_agent(agent))
    }

    pub fn delete_agent(&self, agent_id: &str) -> Result<Value> {
        self.runtime.block_on(self.inner.delete_agent(agent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::backoff::Sleeper;
    use crate::client::transport::{HttpRequest, HttpResponse, HttpTransport};
    use crate::error::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const KEY: &str = "key-0123456789abcdefghij";
    const AGENT: &str = "0b3a6f8e-4c1d-4e2f-9a7b-5c6d7e8f9a0b";

    struct FlakyTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl HttpTransport for FlakyTransport {
        async fn send(
            &self,
            _request: &HttpRequest,
            _api_key: &str,
        ) -> std::result::Result<HttpResponse, TransportError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TransportError::timeout("timed out"))
            } else {
                Ok(HttpResponse::new(200, r#"{"response":"pong"}"#))
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn test_blocking_query_retries_then_succeeds() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
        });
        let sleeper = Arc::new(RecordingSleeper::default());
        let inner = AgentClient::new(Credentials::new(KEY, AGENT), transport.clone())
            .with_sleeper(sleeper.clone());
        let client = BlockingAgentClient::new(inner).unwrap();

        let result = client.query("ping", QueryOptions::new()).unwrap();
        assert_eq!(result.text, "pong");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.waits.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_blocking_mutators_reach_inner() {
        let transport = Arc::new(FlakyTransport {
            calls: AtomicU32::new(0),
        });
        let mut client =
            BlockingAgentClient::new(AgentClient::new(Credentials::new(KEY, AGENT), transport))
                .unwrap();
        client.set_retry_config(5, 2.0);
        client.set_multi_turn_behavior(true);
        client.set_conversation_id("c1");
        assert_eq!(client.inner().scheduler().max_retries(), 5);
        assert_eq!(client.inner().conversation().resolve(None).as_deref(), Some("c1"));
        client.start_new_conversation();
        assert_eq!(client.inner().conversation().resolve(None), None);
    }
}
