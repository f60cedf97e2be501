//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod config;
pub mod query;
pub mod resources;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use agent_client::config::Config;

#[derive(Parser)]
#[command(name = "agent-client")]
#[command(version)]
#[command(about = "Resilient client for a retrieval-augmented agent API", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.agent-client/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to the configured agent
    Query {
        /// Message text
        message: String,
        /// Session id (part of the cache key)
        #[arg(long)]
        session: Option<String>,
        /// Conversation to continue
        #[arg(long)]
        conversation: Option<String>,
        /// Request a streamed response
        #[arg(long)]
        stream: bool,
        /// JSON schema file for structured output
        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,
        /// Print the full normalized result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check credentials and connectivity with one diagnostic query
    TestConnection {
        /// Override the configured API key for this test only
        #[arg(long)]
        api_key: Option<String>,
        /// Override the configured agent id for this test only
        #[arg(long)]
        agent_id: Option<String>,
    },
    /// Manage datastores
    Datastores {
        #[command(subcommand)]
        action: DatastoreAction,
    },
    /// Manage documents in a datastore
    Documents {
        #[command(subcommand)]
        action: DocumentAction,
    },
    /// Manage agents
    Agents {
        #[command(subcommand)]
        action: AgentAction,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum DatastoreAction {
    /// List datastores
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Show datastore metadata
    Get { id: String },
    /// Create a datastore
    Create { name: String },
    /// Delete a datastore
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum DocumentAction {
    /// List documents
    List {
        /// Datastore id (defaults to the configured one)
        #[arg(long)]
        datastore: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Upload a file
    Upload {
        path: PathBuf,
        #[arg(long)]
        datastore: Option<String>,
        /// Custom metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Delete a document
    Delete {
        id: String,
        #[arg(long)]
        datastore: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AgentAction {
    /// List agents
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Show agent metadata
    Get { id: String },
    /// Create an agent
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
        /// Datastore to attach (repeatable)
        #[arg(long = "datastore")]
        datastores: Vec<String>,
    },
    /// Delete an agent
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Validate the effective configuration
    Check,
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    if let Err(e) = agent_client::utils::logging::init_logging(&config.logging) {
        eprintln!("Warning: logging setup failed: {}", e);
    }

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            println!("agent-client {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Query {
            message,
            session,
            conversation,
            stream,
            schema,
            json,
        }) => {
            query::cmd_query(&config, message, session, conversation, stream, schema, json)
                .await?;
        }
        Some(Commands::TestConnection { api_key, agent_id }) => {
            query::cmd_test_connection(&config, api_key, agent_id).await?;
        }
        Some(Commands::Datastores { action }) => {
            resources::cmd_datastores(&config, action).await?;
        }
        Some(Commands::Documents { action }) => {
            resources::cmd_documents(&config, action).await?;
        }
        Some(Commands::Agents { action }) => {
            resources::cmd_agents(&config, action).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(&config, action)?;
        }
    }

    Ok(())
}
