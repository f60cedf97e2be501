//! Datastore, document and agent command handlers.

use anyhow::{Context, Result};
use serde_json::Value;

use agent_client::{AgentClient, Config, ListParams, NewAgent};

use super::{AgentAction, DatastoreAction, DocumentAction};

fn list_params(limit: Option<u32>, cursor: Option<String>) -> ListParams {
    ListParams { limit, cursor }
}

fn print_json(value: &Value) -> Result<()> {
    if value.is_null() {
        println!("[OK] Done");
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

pub(crate) async fn cmd_datastores(config: &Config, action: DatastoreAction) -> Result<()> {
    let client = AgentClient::from_config(config).context("Failed to build client")?;
    let value = match action {
        DatastoreAction::List { limit, cursor } => {
            client.list_datastores(&list_params(limit, cursor)).await?
        }
        DatastoreAction::Get { id } => client.get_datastore(&id).await?,
        DatastoreAction::Create { name } => client.create_datastore(&name).await?,
        DatastoreAction::Delete { id } => client.delete_datastore(&id).await?,
    };
    print_json(&value)
}

pub(crate) async fn cmd_documents(config: &Config, action: DocumentAction) -> Result<()> {
    let client = AgentClient::from_config(config).context("Failed to build client")?;
    let value = match action {
        DocumentAction::List {
            datastore,
            limit,
            cursor,
        } => {
            client
                .list_documents(datastore.as_deref(), &list_params(limit, cursor))
                .await?
        }
        DocumentAction::Upload {
            path,
            datastore,
            metadata,
        } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("Upload path has no file name")?
                .to_string();
            let metadata = metadata
                .map(|m| serde_json::from_str::<Value>(&m))
                .transpose()
                .context("--metadata is not valid JSON")?;
            client
                .upload_document(datastore.as_deref(), &file_name, bytes, metadata)
                .await?
        }
        DocumentAction::Delete { id, datastore } => {
            client.delete_document(datastore.as_deref(), &id).await?
        }
    };
    print_json(&value)
}

pub(crate) async fn cmd_agents(config: &Config, action: AgentAction) -> Result<()> {
    let client = AgentClient::from_config(config).context("Failed to build client")?;
    let value = match action {
        AgentAction::List { limit, cursor } => {
            client.list_agents(&list_params(limit, cursor)).await?
        }
        AgentAction::Get { id } => client.get_agent(&id).await?,
        AgentAction::Create {
            name,
            description,
            system_prompt,
            datastores,
        } => {
            let agent = NewAgent {
                name,
                description,
                system_prompt,
                datastore_ids: datastores,
            };
            client.create_agent(&agent).await?
        }
        AgentAction::Delete { id } => client.delete_agent(&id).await?,
    };
    print_json(&value)
}
