use thiserror::Error;

use crate::analysis::Specialist;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Analysis not found: {analysis_id}")]
    AnalysisNotFound { analysis_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Stored record is corrupt: {message}")]
    Corrupt { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Failures of a single request to the generation backend.
///
/// All of these are considered transient and are retried by the
/// structured client.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid response envelope: {message}")]
    InvalidEnvelope { message: String },

    #[error("Pipe reported failure: {message}")]
    Rejected { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outcome of a structured generation call that did not produce data.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The backend answered but the payload is not the expected structure.
    /// Never retried.
    #[error("Invalid AI structure: {message}")]
    InvalidStructure { message: String },

    /// Every attempt failed at the transport level.
    #[error("Generation exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: TransportError,
    },
}

/// Prompt template lookup errors
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("Failed to read template {name}: {message}")]
    Io { name: String, message: String },
}

/// Failure of one pipeline step (decomposition, one specialist, or synthesis).
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Failed to serialize step input: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Step aborted: {message}")]
    Aborted { message: String },
}

/// Run-level failures of the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Orchestration failed: {source}")]
    Orchestration {
        #[source]
        source: StepError,
    },

    #[error("Foundation wave failed ({specialist}): {source}")]
    Foundation {
        specialist: Specialist,
        #[source]
        source: StepError,
    },

    #[error("Challenge wave failed ({specialist}): {source}")]
    Challenge {
        specialist: Specialist,
        #[source]
        source: StepError,
    },

    #[error("Synthesis failed: {source}")]
    Synthesis {
        #[source]
        source: StepError,
    },

    #[error("Analysis timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AnalysisError> for McpError {
    fn from(err: AnalysisError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

impl From<StorageError> for McpError {
    fn from(err: StorageError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

impl AnalysisError {
    /// Name of the pipeline phase that failed, used as a log field.
    pub fn phase(&self) -> &'static str {
        match self {
            AnalysisError::Validation { .. } => "init",
            AnalysisError::Orchestration { .. } => "decompose",
            AnalysisError::Foundation { .. } => "foundations",
            AnalysisError::Challenge { .. } => "challenge",
            AnalysisError::Synthesis { .. } => "synthesize",
            AnalysisError::Timeout { .. } => "timeout",
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for single backend requests
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for structured generation
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Result type alias for prompt lookups
pub type PromptResult<T> = Result<T, PromptError>;

/// Result type alias for a single pipeline step
pub type StepResult<T> = Result<T, StepError>;

/// Result type alias for a whole analysis run
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
