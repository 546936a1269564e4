//! # MCP Decision Verdict Server
//!
//! A Model Context Protocol (MCP) server that audits a decision through a
//! multi-phase pipeline of Langbase Pipe calls and returns a structured
//! verdict: critical flaws, decision paths with robustness scores, and a
//! synthesis summary.
//!
//! ## Pipeline
//!
//! - **Decomposition**: one mission per specialist plus the implicit assumptions
//! - **Foundations wave**: logical, causal and risk specialists run in parallel
//! - **Challenge wave**: skeptic contests the logical report while stress
//!   amplifies the risk report
//! - **Synthesis**: every report is merged into the final verdict
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Langbase Pipes (HTTP)
//!                    ↓
//!              SQLite (History)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mcp_decision_verdict::{Config, AppState, McpServer};
//! use mcp_decision_verdict::langbase::LangbaseClient;
//! use mcp_decision_verdict::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let langbase = LangbaseClient::new(&config.langbase, &config.request)?;
//!     let state = Arc::new(AppState::new(config, storage, Arc::new(langbase))?);
//!     McpServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

/// Decision analysis pipeline: data model, specialists, orchestrator, events.
pub mod analysis;
/// Configuration management for the MCP server.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Structured generation with retry on top of a model backend.
pub mod generation;
/// Langbase API client and types for pipe communication.
pub mod langbase;
/// Prompt templates and the prompt store.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite storage layer for analysis history.
pub mod storage;

pub use analysis::{AnalysisOrchestrator, DecisionInput};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
