//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use mcp_decision_verdict::config::{Config, LogFormat};
use mcp_decision_verdict::AppError;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

const OVERRIDABLE: &[&str] = &[
    "LANGBASE_BASE_URL",
    "DATABASE_PATH",
    "DATABASE_MAX_CONNECTIONS",
    "PERSIST_ANALYSES",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "REQUEST_TIMEOUT_MS",
    "MAX_ATTEMPTS",
    "RETRY_DELAY_MS",
    "RETRY_MAX_DELAY_MS",
    "PIPE_ORCHESTRATOR",
    "PIPE_AGENT",
    "PIPE_SYNTHESIS",
    "REASONING_MODEL",
    "FAST_MODEL",
    "ANALYSIS_TIMEOUT_MS",
    "PROMPTS_DIR",
];

/// Start every test from a known environment.
fn reset_env() {
    for key in OVERRIDABLE {
        env::remove_var(key);
    }
    env::set_var("LANGBASE_API_KEY", "test-key");
}

#[test]
#[serial]
fn test_config_defaults() {
    reset_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.langbase.api_key, "test-key");
    assert_eq!(config.langbase.base_url, "https://api.langbase.com");
    assert_eq!(config.database.path, PathBuf::from("./data/decisions.db"));
    assert_eq!(config.database.max_connections, 5);
    assert!(config.database.persist_analyses);
    assert_eq!(config.request.timeout_ms, 30000);
    assert_eq!(config.request.max_attempts, 3);
    assert_eq!(config.request.retry_delay_ms, 500);
    assert_eq!(config.request.retry_max_delay_ms, 8000);
    assert_eq!(config.pipes.orchestrator, "decision-orchestrator-v1");
    assert_eq!(config.pipes.agent, "decision-agent-v1");
    assert_eq!(config.pipes.synthesis, "decision-synthesis-v1");
    assert_eq!(config.analysis.timeout_ms, 300_000);
    assert!(config.analysis.prompts_dir.is_none());
}

#[test]
#[serial]
fn test_config_from_env_custom_base_url() {
    reset_env();
    env::set_var("LANGBASE_BASE_URL", "https://custom.api.com");

    let config = Config::from_env().unwrap();
    assert_eq!(config.langbase.base_url, "https://custom.api.com");

    env::remove_var("LANGBASE_BASE_URL");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    reset_env();
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");
    env::set_var("PERSIST_ANALYSES", "false");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);
    assert!(!config.database.persist_analyses);

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    reset_env();
    env::set_var("LOG_FORMAT", "JSON");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    reset_env();
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_ATTEMPTS", "5");
    env::set_var("RETRY_DELAY_MS", "2000");
    env::set_var("RETRY_MAX_DELAY_MS", "16000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_attempts, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);
    assert_eq!(config.request.retry_max_delay_ms, 16000);

    reset_env();
}

#[test]
#[serial]
fn test_config_rejects_zero_attempts() {
    reset_env();
    env::set_var("MAX_ATTEMPTS", "0");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
    assert!(err.to_string().contains("MAX_ATTEMPTS"));

    env::remove_var("MAX_ATTEMPTS");
}

#[test]
#[serial]
fn test_config_rejects_zero_analysis_timeout() {
    reset_env();
    env::set_var("ANALYSIS_TIMEOUT_MS", "0");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
    assert!(err.to_string().contains("ANALYSIS_TIMEOUT_MS"));

    env::set_var("ANALYSIS_TIMEOUT_MS", "1");
    assert_eq!(Config::from_env().unwrap().analysis.timeout_ms, 1);

    env::remove_var("ANALYSIS_TIMEOUT_MS");
}

#[test]
#[serial]
fn test_config_invalid_numbers_fall_back_to_defaults() {
    reset_env();
    env::set_var("REQUEST_TIMEOUT_MS", "soon");
    env::set_var("ANALYSIS_TIMEOUT_MS", "-1");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 30000);
    assert_eq!(config.analysis.timeout_ms, 300_000);

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_pipes_and_models() {
    reset_env();
    env::set_var("PIPE_ORCHESTRATOR", "orch-v2");
    env::set_var("PIPE_AGENT", "agent-v2");
    env::set_var("PIPE_SYNTHESIS", "synth-v2");
    env::set_var("REASONING_MODEL", "anthropic:claude");
    env::set_var("FAST_MODEL", "openai:small");

    let config = Config::from_env().unwrap();
    assert_eq!(config.pipes.orchestrator, "orch-v2");
    assert_eq!(config.pipes.agent, "agent-v2");
    assert_eq!(config.pipes.synthesis, "synth-v2");
    assert_eq!(config.pipes.reasoning_model, "anthropic:claude");
    assert_eq!(config.pipes.fast_model, "openai:small");

    reset_env();
}

#[test]
#[serial]
fn test_config_from_env_analysis_settings() {
    reset_env();
    env::set_var("ANALYSIS_TIMEOUT_MS", "120000");
    env::set_var("PROMPTS_DIR", "/etc/decision-prompts");

    let config = Config::from_env().unwrap();
    assert_eq!(config.analysis.timeout_ms, 120_000);
    assert_eq!(
        config.analysis.prompts_dir,
        Some(PathBuf::from("/etc/decision-prompts"))
    );

    env::set_var("PROMPTS_DIR", "  ");
    let config = Config::from_env().unwrap();
    assert!(config.analysis.prompts_dir.is_none());

    reset_env();
}
