use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub analysis: AnalysisConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// Store completed analyses for later retrieval.
    pub persist_analyses: bool,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request and retry configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-attempt HTTP timeout.
    pub timeout_ms: u64,
    /// Attempts per structured generation call, including the first.
    pub max_attempts: u32,
    /// Backoff base delay.
    pub retry_delay_ms: u64,
    /// Upper bound for a single backoff delay.
    pub retry_max_delay_ms: u64,
}

/// Langbase pipe names and the models they are created with
#[derive(Debug, Clone)]
pub struct PipeConfig {
    pub orchestrator: String,
    pub agent: String,
    pub synthesis: String,
    /// Model behind the decomposition and specialist pipes.
    pub reasoning_model: String,
    /// Model behind the synthesis pipe.
    pub fast_model: String,
}

/// Pipeline-level settings
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Wall-clock budget for one complete run.
    pub timeout_ms: u64,
    /// Directory whose `<name>.md` files override the built-in templates.
    pub prompts_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").map_err(|_| AppError::Config {
                message: "LANGBASE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/decisions.db".to_string()),
            ),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5),
            persist_analyses: parse_bool("PERSIST_ANALYSES", true),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS", 30000),
            max_attempts: parse_var("MAX_ATTEMPTS", 3),
            retry_delay_ms: parse_var("RETRY_DELAY_MS", 500),
            retry_max_delay_ms: parse_var("RETRY_MAX_DELAY_MS", 8000),
        };

        if request.max_attempts == 0 {
            return Err(AppError::Config {
                message: "MAX_ATTEMPTS must be at least 1".to_string(),
            });
        }

        let defaults = PipeConfig::default();
        let pipes = PipeConfig {
            orchestrator: env::var("PIPE_ORCHESTRATOR").unwrap_or(defaults.orchestrator),
            agent: env::var("PIPE_AGENT").unwrap_or(defaults.agent),
            synthesis: env::var("PIPE_SYNTHESIS").unwrap_or(defaults.synthesis),
            reasoning_model: env::var("REASONING_MODEL").unwrap_or(defaults.reasoning_model),
            fast_model: env::var("FAST_MODEL").unwrap_or(defaults.fast_model),
        };

        let analysis = AnalysisConfig {
            timeout_ms: parse_var("ANALYSIS_TIMEOUT_MS", 300_000),
            prompts_dir: env::var("PROMPTS_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        };

        if analysis.timeout_ms == 0 {
            return Err(AppError::Config {
                message: "ANALYSIS_TIMEOUT_MS must be at least 1".to_string(),
            });
        }

        Ok(Config {
            langbase,
            database,
            logging,
            request,
            pipes,
            analysis,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_attempts: 3,
            retry_delay_ms: 500,
            retry_max_delay_ms: 8000,
        }
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            orchestrator: "decision-orchestrator-v1".to_string(),
            agent: "decision-agent-v1".to_string(),
            synthesis: "decision-synthesis-v1".to_string(),
            reasoning_model: "openai:gpt-4o".to_string(),
            fast_model: "openai:gpt-4o-mini".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 300_000,
            prompts_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_defaults() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.retry_max_delay_ms, 8000);
    }

    #[test]
    fn test_pipe_config_defaults() {
        let pipes = PipeConfig::default();
        assert_eq!(pipes.orchestrator, "decision-orchestrator-v1");
        assert_eq!(pipes.agent, "decision-agent-v1");
        assert_eq!(pipes.synthesis, "decision-synthesis-v1");
    }

    #[test]
    fn test_analysis_config_defaults() {
        let analysis = AnalysisConfig::default();
        assert_eq!(analysis.timeout_ms, 300_000);
        assert!(analysis.prompts_dir.is_none());
    }
}
