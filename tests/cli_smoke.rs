//! CLI smoke tests: verify commands that work without network access.
//!
//! These tests run the compiled binary against a temporary config file and
//! check exit codes and output.

use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

const KEY: &str = "key-0123456789abcdefghij";
const AGENT: &str = "0b3a6f8e-4c1d-4e2f-9a7b-5c6d7e8f9a0b";

const ENV_VARS: &[&str] = &[
    "AGENT_CLIENT_API_KEY",
    "AGENT_CLIENT_AGENT_ID",
    "AGENT_CLIENT_DATASTORE_ID",
    "AGENT_CLIENT_API_BASE",
    "AGENT_CLIENT_TIMEOUT_SECS",
    "AGENT_CLIENT_PROXY_HOST",
    "AGENT_CLIENT_PROXY_PORT",
    "AGENT_CLIENT_PROXY_USERNAME",
    "AGENT_CLIENT_PROXY_PASSWORD",
    "AGENT_CLIENT_MAX_RETRIES",
    "AGENT_CLIENT_BASE_DELAY_SECS",
];

/// Helper: run agent-client with given args and return (exit_code, stdout, stderr).
fn run_cli(config: Option<&Path>, args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_agent-client");
    let mut cmd = Command::new(bin);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    if let Some(path) = config {
        cmd.arg("--config").arg(path);
    }
    let output = cmd
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to execute agent-client binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.json");
    std::fs::write(&path, body).unwrap();
    path
}

fn valid_config(dir: &Path) -> std::path::PathBuf {
    write_config(
        dir,
        &format!(r#"{{"api_key":"{}","agent_id":"{}"}}"#, KEY, AGENT),
    )
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn cli_no_args_shows_help() {
    let (code, stdout, _stderr) = run_cli(None, &[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("agent-client"));
}

#[test]
fn cli_help_lists_commands() {
    let (code, stdout, _stderr) = run_cli(None, &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("query"));
    assert!(stdout.contains("test-connection"));
    assert!(stdout.contains("datastores"));
}

#[test]
fn cli_version_command() {
    let (code, stdout, _stderr) = run_cli(None, &["version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("agent-client"));
    assert!(stdout.contains('.'));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn cli_config_check_valid() {
    let dir = tempdir().unwrap();
    let path = valid_config(dir.path());
    let (code, stdout, _stderr) = run_cli(Some(&path), &["config", "check"]);
    assert_eq!(code, 0, "stdout: {}", stdout);
    assert!(stdout.contains("[OK] api_key"));
    assert!(stdout.contains("[OK] agent_id"));
}

#[test]
fn cli_config_check_missing_credentials() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "{}");
    let (code, stdout, _stderr) = run_cli(Some(&path), &["config", "check"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("[ERROR] api_key"));
}

#[test]
fn cli_config_show_redacts_key() {
    let dir = tempdir().unwrap();
    let path = valid_config(dir.path());
    let (code, stdout, _stderr) = run_cli(Some(&path), &["config", "show"]);
    assert_eq!(code, 0);
    assert!(!stdout.contains(KEY));
    assert!(stdout.contains("key-01***"));
    assert!(stdout.contains(AGENT));
}

#[test]
fn cli_invalid_config_json_fails() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "{not json");
    let (code, _stdout, stderr) = run_cli(Some(&path), &["config", "check"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Failed to load config"));
}

// ============================================================================
// Validation without network
// ============================================================================

#[test]
fn cli_query_rejects_bad_key_before_network() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        &format!(
            r#"{{"api_key":"sk-wrong-prefix-000000","agent_id":"{}","api_base":"http://127.0.0.1:9"}}"#,
            AGENT
        ),
    );
    let (code, _stdout, stderr) = run_cli(Some(&path), &["query", "hello"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid API key"), "stderr: {}", stderr);
}

#[test]
fn cli_query_without_credentials_is_missing_config() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), "{}");
    let (code, _stdout, stderr) = run_cli(Some(&path), &["query", "hello"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Missing configuration"), "stderr: {}", stderr);
}

#[test]
fn cli_test_connection_with_bad_agent_override() {
    let dir = tempdir().unwrap();
    let path = valid_config(dir.path());
    let (code, stdout, _stderr) = run_cli(
        Some(&path),
        &["test-connection", "--agent-id", "not-a-uuid"],
    );
    assert_eq!(code, 1);
    assert!(stdout.contains("invalid_agent_id"));
    assert!(!stdout.contains(KEY));
}

#[test]
fn cli_documents_without_datastore() {
    let dir = tempdir().unwrap();
    let path = valid_config(dir.path());
    let (code, _stdout, stderr) = run_cli(Some(&path), &["documents", "list"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("datastore_id"), "stderr: {}", stderr);
}

#[test]
fn cli_test_connection_overrides_work_without_stored_credentials() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), r#"{"api_base":"http://127.0.0.1:9"}"#);
    let (code, stdout, stderr) = run_cli(
        Some(&path),
        &["test-connection", "--api-key", KEY, "--agent-id", AGENT],
    );
    // Nothing listens on the discard port, so the single attempt fails upstream
    assert_eq!(code, 1);
    assert!(!stderr.contains("Missing configuration"), "stderr: {}", stderr);
    assert!(stdout.contains(AGENT), "stdout: {}", stdout);
    assert!(stdout.contains("key-01***"));
    assert!(!stdout.contains("invalid_api_key"));
    assert!(!stdout.contains("invalid_agent_id"));
}

#[test]
fn cli_test_connection_partial_override_reports_missing_half() {
    let dir = tempdir().unwrap();
    let path = write_config(dir.path(), r#"{"api_base":"http://127.0.0.1:9"}"#);
    let (code, stdout, stderr) = run_cli(Some(&path), &["test-connection", "--api-key", KEY]);
    assert_eq!(code, 1);
    assert!(!stderr.contains("Missing configuration"), "stderr: {}", stderr);
    assert!(stdout.contains("invalid_agent_id"), "stdout: {}", stdout);
}
