//! Config show/check command handlers.

use anyhow::Result;

use agent_client::config::validate::{validate_config, DiagnosticLevel};
use agent_client::config::Config;
use agent_client::utils::sanitize::redact_secret;

use super::ConfigAction;

pub(crate) fn cmd_config(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            shown.api_key = shown.api_key.as_deref().map(redact_secret);
            if let Some(proxy) = shown.proxy.as_mut() {
                proxy.password = proxy.password.as_deref().map(redact_secret);
            }
            println!("Config file: {}", Config::path().display());
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigAction::Check => {
            println!("Config file: {}", Config::path().display());

            let diagnostics = validate_config(config);
            for diag in &diagnostics {
                println!("{}", diag);
            }

            let errors = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Error)
                .count();
            let warnings = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Warn)
                .count();

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
            if errors > 0 {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
