//! Structured generation on top of a single-attempt model backend.
//!
//! - [`GenerationBackend`]: one request to the model, transport errors only
//! - [`StructuredClient`]: retry with exponential backoff, then typed parsing
//! - [`StructuredOutput`]: post-deserialization shape checks for payloads
//!
//! Transport failures are retried. A payload that arrives but does not
//! parse into the expected type is reported immediately as
//! [`GenerationError::InvalidStructure`](crate::error::GenerationError).

mod client;
mod retry;

pub use client::*;
pub use retry::*;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;

/// Capability the model may use while answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGrant {
    /// Web search for fact-checking claims.
    WebSearch,
}

impl ToolGrant {
    /// Wire name of the grant.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolGrant::WebSearch => "web_search",
        }
    }
}

impl std::fmt::Display for ToolGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One fully composed request for structured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Pipeline step label, used for logging (e.g. `agent:logical`).
    pub step: String,
    /// Backend pipe that serves the request.
    pub pipe: String,
    /// System instruction, already including every directive.
    pub system: String,
    /// User-side prompt body.
    pub prompt: String,
    /// Tools the model may call.
    pub tools: Vec<ToolGrant>,
}

impl GenerationRequest {
    /// Create a request without tool grants.
    pub fn new(
        step: impl Into<String>,
        pipe: impl Into<String>,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            step: step.into(),
            pipe: pipe.into(),
            system: system.into(),
            prompt: prompt.into(),
            tools: Vec::new(),
        }
    }

    /// Grant a tool for this request.
    pub fn with_tool(mut self, tool: ToolGrant) -> Self {
        if !self.tools.contains(&tool) {
            self.tools.push(tool);
        }
        self
    }
}

/// A model service that answers one request at a time.
///
/// Implementations perform exactly one attempt and return the raw
/// completion text. Every error is a transport error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send the request and return the completion text.
    async fn complete(&self, request: &GenerationRequest) -> TransportResult<String>;
}

/// A type the structured client can produce.
///
/// `validate` runs after deserialization; an `Err` is reported as an
/// invalid structure.
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Check invariants serde cannot express.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl StructuredOutput for serde_json::Value {}

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (fast path)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
pub fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    // Fast path: raw JSON
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

/// Parse and validate a completion into `T`.
pub fn parse_structured<T: StructuredOutput>(completion: &str) -> Result<T, String> {
    let json_str = extract_json_from_completion(completion)?;
    let value: T = serde_json::from_str(json_str).map_err(|e| format!("{}", e))?;
    value.validate()?;
    Ok(value)
}
