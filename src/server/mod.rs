//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;
use tracing::warn;

use crate::analysis::AnalysisOrchestrator;
use crate::config::Config;
use crate::error::AppResult;
use crate::generation::GenerationBackend;
use crate::storage::{Invocation, SqliteStorage, Storage};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Analysis pipeline.
    pub orchestrator: AnalysisOrchestrator,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        storage: SqliteStorage,
        backend: Arc<dyn GenerationBackend>,
    ) -> AppResult<Self> {
        tracing::info!(
            orchestrator_pipe = %config.pipes.orchestrator,
            agent_pipe = %config.pipes.agent,
            synthesis_pipe = %config.pipes.synthesis,
            timeout_ms = config.analysis.timeout_ms,
            "AppState initializing with pipe configuration"
        );

        let orchestrator = AnalysisOrchestrator::from_config(backend, &config)?;

        Ok(Self {
            config,
            storage,
            orchestrator,
        })
    }

    /// Log a tool invocation; storage failures are reported but not returned.
    pub async fn record_invocation(&self, invocation: &Invocation) {
        if let Err(e) = self.storage.log_invocation(invocation).await {
            warn!(
                tool = %invocation.tool_name,
                error = %e,
                "Failed to log invocation"
            );
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
