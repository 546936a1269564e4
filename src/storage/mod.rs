//! Storage layer for analysis history.
//!
//! Completed analyses are kept so they can be listed and reopened later,
//! and every MCP tool call is logged as an [`Invocation`].

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{AnalysisOutcome, AnalysisResponse, DecisionInput};
use crate::error::StorageResult;

/// A completed analysis together with the input that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Identifier assigned when the analysis completed.
    pub id: String,
    /// The decision text as submitted.
    pub decision: String,
    /// Reasoning as submitted, if any.
    pub reasoning: Option<String>,
    /// Full composite result.
    pub outcome: AnalysisOutcome,
    /// Completion time.
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Record a response for the input it answers.
    pub fn new(input: &DecisionInput, response: &AnalysisResponse) -> Self {
        Self {
            id: response.id.clone(),
            decision: input.decision.clone(),
            reasoning: input.reasoning.clone(),
            outcome: response.outcome.clone(),
            created_at: response.timestamp,
        }
    }

    /// Rebuild the response the caller originally received.
    pub fn into_response(self) -> AnalysisResponse {
        AnalysisResponse {
            id: self.id,
            outcome: self.outcome,
            timestamp: self.created_at,
        }
    }
}

/// Listing entry for the analysis history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub id: String,
    pub decision: String,
    pub synthesis_summary: String,
    pub critical_flaws: i64,
    pub created_at: DateTime<Utc>,
}

/// A logged MCP tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Unique invocation identifier.
    pub id: String,
    /// Analysis produced by this call, if any.
    pub analysis_id: Option<String>,
    /// Name of the MCP tool invoked.
    pub tool_name: String,
    /// Input parameters as JSON.
    pub input: serde_json::Value,
    /// Output result as JSON (if successful).
    pub output: Option<serde_json::Value>,
    /// Latency in milliseconds.
    pub latency_ms: Option<i64>,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Error message (if failed).
    pub error: Option<String>,
    /// When the invocation occurred.
    pub created_at: DateTime<Utc>,
}

impl Invocation {
    /// Create a new invocation log entry
    pub fn new(tool_name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            analysis_id: None,
            tool_name: tool_name.into(),
            input,
            output: None,
            latency_ms: None,
            success: true,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Link the invocation to the analysis it produced
    pub fn with_analysis(mut self, analysis_id: impl Into<String>) -> Self {
        self.analysis_id = Some(analysis_id.into());
        self
    }

    /// Mark as successful with output
    pub fn success(mut self, output: serde_json::Value, latency_ms: i64) -> Self {
        self.success = true;
        self.output = Some(output);
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Mark as failed with error
    pub fn failure(mut self, error: impl Into<String>, latency_ms: i64) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Persistence for analysis history and the invocation log.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a completed analysis.
    async fn save_analysis(&self, record: &AnalysisRecord) -> StorageResult<()>;
    /// Get an analysis by ID.
    async fn get_analysis(&self, id: &str) -> StorageResult<Option<AnalysisRecord>>;
    /// Most recent analyses first.
    async fn list_analyses(&self, limit: u32) -> StorageResult<Vec<AnalysisSummary>>;
    /// Delete an analysis; returns whether it existed.
    async fn delete_analysis(&self, id: &str) -> StorageResult<bool>;

    /// Log a tool invocation.
    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()>;
    /// Most recent invocations first.
    async fn recent_invocations(&self, limit: u32) -> StorageResult<Vec<Invocation>>;
}
