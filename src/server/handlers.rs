use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, warn};

use super::SharedState;
use crate::analysis::{AnalysisObserver, AnalysisResponse, DecisionInput, NoopObserver};
use crate::error::{McpError, McpResult, StorageError};
use crate::storage::{AnalysisRecord, Invocation, Storage};

/// Run a full decision analysis.
pub const ANALYZE_TOOL: &str = "decision_analyze";
/// List stored analyses.
pub const HISTORY_LIST_TOOL: &str = "decision_history_list";
/// Fetch one stored analysis.
pub const HISTORY_GET_TOOL: &str = "decision_history_get";
/// Delete one stored analysis.
pub const HISTORY_DELETE_TOOL: &str = "decision_history_delete";

const DEFAULT_HISTORY_LIMIT: u32 = 20;
const MAX_HISTORY_LIMIT: u32 = 100;

/// Arguments of [`ANALYZE_TOOL`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeParams {
    /// The decision to analyse.
    pub decision: String,
    /// Optional justification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Emit progress notifications while the analysis runs.
    #[serde(default)]
    pub stream: bool,
}

impl AnalyzeParams {
    fn input(&self) -> DecisionInput {
        let input = DecisionInput::new(&self.decision);
        match &self.reasoning {
            Some(reasoning) => input.with_reasoning(reasoning),
            None => input,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoryListParams {
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AnalysisIdParams {
    id: String,
}

/// Route tool calls to appropriate handlers.
///
/// `observer` receives analysis events when a streaming analysis is requested.
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
    observer: &dyn AnalysisObserver,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        ANALYZE_TOOL => handle_analyze(state, arguments, observer).await,
        HISTORY_LIST_TOOL => handle_history_list(state, arguments).await,
        HISTORY_GET_TOOL => handle_history_get(state, arguments).await,
        HISTORY_DELETE_TOOL => handle_history_delete(state, arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

/// Handle decision_analyze tool call
async fn handle_analyze(
    state: &SharedState,
    arguments: Option<Value>,
    observer: &dyn AnalysisObserver,
) -> McpResult<Value> {
    let start = Instant::now();
    let params: AnalyzeParams = parse_arguments(ANALYZE_TOOL, arguments)?;
    let input = params.input();
    let invocation = Invocation::new(ANALYZE_TOOL, serde_json::to_value(&params)?);

    let observer: &dyn AnalysisObserver = if params.stream {
        observer
    } else {
        &NoopObserver
    };
    let result = state
        .orchestrator
        .analyze_with_observer(&input, observer)
        .await;
    let latency = start.elapsed().as_millis() as i64;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            state
                .record_invocation(&invocation.failure(e.to_string(), latency))
                .await;
            return Err(e.into());
        }
    };

    let response = AnalysisResponse::new(outcome);
    let value = serde_json::to_value(&response)?;

    if state.config.database.persist_analyses {
        let record = AnalysisRecord::new(&input, &response);
        if let Err(e) = state.storage.save_analysis(&record).await {
            warn!(analysis_id = %response.id, error = %e, "Failed to persist analysis");
        }
    }

    state
        .record_invocation(
            &invocation
                .with_analysis(&response.id)
                .success(value.clone(), latency),
        )
        .await;

    info!(analysis_id = %response.id, latency_ms = latency, "Decision analysis completed");
    Ok(value)
}

/// Handle decision_history_list tool call
async fn handle_history_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: HistoryListParams =
        parse_arguments(HISTORY_LIST_TOOL, Some(arguments.unwrap_or_else(|| json!({}))))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let analyses = state.storage.list_analyses(limit).await?;

    Ok(json!({
        "count": analyses.len(),
        "analyses": analyses,
    }))
}

/// Handle decision_history_get tool call
async fn handle_history_get(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: AnalysisIdParams = parse_arguments(HISTORY_GET_TOOL, arguments)?;

    let record = state
        .storage
        .get_analysis(&params.id)
        .await?
        .ok_or(StorageError::AnalysisNotFound {
            analysis_id: params.id.clone(),
        })?;

    Ok(json!({
        "decision": record.decision,
        "reasoning": record.reasoning,
        "analysis": record.into_response(),
    }))
}

/// Handle decision_history_delete tool call
async fn handle_history_delete(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: AnalysisIdParams = parse_arguments(HISTORY_DELETE_TOOL, arguments)?;

    let deleted = state.storage.delete_analysis(&params.id).await?;
    if !deleted {
        return Err(StorageError::AnalysisNotFound {
            analysis_id: params.id,
        }
        .into());
    }

    Ok(json!({ "id": params.id, "deleted": true }))
}

// ============================================================================
// Helper functions
// ============================================================================

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestParams {
        content: String,
        value: i32,
    }

    #[test]
    fn test_parse_arguments_success() {
        let args = Some(json!({
            "content": "test content",
            "value": 42
        }));

        let params: TestParams = parse_arguments("test.tool", args).unwrap();
        assert_eq!(params.content, "test content");
        assert_eq!(params.value, 42);
    }

    #[test]
    fn test_parse_arguments_missing_arguments() {
        let result: McpResult<TestParams> = parse_arguments("test.tool", None);

        let err = result.unwrap_err();
        assert!(matches!(err, McpError::InvalidParameters { .. }));
        assert!(err.to_string().contains("Missing arguments"));
        assert!(err.to_string().contains("test.tool"));
    }

    #[test]
    fn test_parse_arguments_wrong_type() {
        let args = Some(json!({
            "content": "test",
            "value": "not a number"
        }));

        let result: McpResult<TestParams> = parse_arguments("test.tool", args);
        assert!(matches!(
            result.unwrap_err(),
            McpError::InvalidParameters { .. }
        ));
    }

    #[test]
    fn test_analyze_params_defaults() {
        let params: AnalyzeParams =
            parse_arguments(ANALYZE_TOOL, Some(json!({"decision": "Sell the car"}))).unwrap();
        assert!(!params.stream);
        assert!(params.reasoning.is_none());
        assert_eq!(
            params.input().context(),
            "DECISION: Sell the car\nREASONING: Not provided"
        );
    }

    #[test]
    fn test_analyze_params_require_decision() {
        let result: McpResult<AnalyzeParams> =
            parse_arguments(ANALYZE_TOOL, Some(json!({"reasoning": "because"})));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("decision_analyze"));
        assert!(err.to_string().contains("missing field `decision`"));
    }

    #[test]
    fn test_blank_reasoning_dropped_from_input() {
        let params = AnalyzeParams {
            decision: "x".to_string(),
            reasoning: Some("   ".to_string()),
            stream: true,
        };
        assert!(params.input().reasoning.is_none());
    }
}
