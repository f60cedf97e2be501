//! Agent Client - resilient client for a remote retrieval-augmented agent API
//!
//! Validates credentials, retries transient failures with jittered
//! exponential backoff, caches answers and normalizes the upstream's many
//! response shapes into one [`QueryResult`].

pub mod client;
pub mod config;
pub mod error;
pub mod utils;

pub use client::blocking::BlockingAgentClient;
pub use client::resources::{ListParams, NewAgent};
pub use client::{
    AgentClient, BackoffScheduler, Citation, ConnectionReport, Credentials, HttpTransport,
    QueryOptions, QueryResult, ResponseCache, Sleeper,
};
pub use config::{Config, CredentialStore};
pub use error::{ApiError, ClientError, Result, TransportError};
