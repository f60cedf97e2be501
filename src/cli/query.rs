//! Query and connection-test command handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};

use agent_client::{AgentClient, Config, CredentialStore, Credentials, QueryOptions};

pub(crate) async fn cmd_query(
    config: &Config,
    message: String,
    session: Option<String>,
    conversation: Option<String>,
    stream: bool,
    schema: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let client = AgentClient::from_config(config).context("Failed to build client")?;

    let mut options = QueryOptions::new().with_stream(stream);
    if let Some(session) = session {
        options = options.with_session_id(session);
    }
    if let Some(conversation) = conversation {
        options = options.with_conversation_id(conversation);
    }
    if let Some(path) = schema {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read schema {}", path.display()))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).context("Schema file is not valid JSON")?;
        options = options.with_schema(value);
    }

    let result = client.query(&message, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.text);
    if result.has_citations() {
        println!();
        println!("Sources:");
        for (i, c) in result.citations.iter().enumerate() {
            if c.url.is_empty() {
                println!("  [{}] {}", i + 1, c.title);
            } else {
                println!("  [{}] {} <{}>", i + 1, c.title, c.url);
            }
        }
    }
    if let Some(conversation_id) = &result.conversation_id {
        println!();
        println!("conversation: {}", conversation_id);
    }
    Ok(())
}

pub(crate) async fn cmd_test_connection(
    config: &Config,
    api_key: Option<String>,
    agent_id: Option<String>,
) -> Result<()> {
    let client = if api_key.is_some() || agent_id.is_some() {
        // Overrides are tested as given; missing halves come from the store
        // and an absent value fails validation in the report.
        let mut credentials = Credentials::new(
            api_key.or_else(|| config.api_key()).unwrap_or_default(),
            agent_id.or_else(|| config.agent_id()).unwrap_or_default(),
        );
        if let Some(ds) = config.datastore_id() {
            credentials = credentials.with_datastore(ds);
        }
        AgentClient::from_config_with(config, credentials)
    } else {
        AgentClient::from_config(config)
    }
    .context("Failed to build client")?;

    let report = client.test_connection().await;

    let d = &report.diagnostics;
    println!("API base:  {}", d.api_base);
    println!("API key:   {}", d.api_key_preview);
    println!("Agent:     {}", d.agent_id);
    println!("Elapsed:   {} ms", d.elapsed_ms);
    if let Some(status) = d.status_code {
        println!("Status:    {}", status);
    }
    if report.success {
        println!("\n[OK] Connection succeeded");
    } else {
        println!(
            "\n[ERROR] {} ({})",
            d.error.as_deref().unwrap_or("connection failed"),
            d.error_kind.as_deref().unwrap_or("unknown")
        );
        std::process::exit(1);
    }
    Ok(())
}
