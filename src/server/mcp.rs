//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! This module provides the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response handling
//! - Tool definitions and schemas
//! - Line-delimited stdio transport with analysis progress notifications

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{
    handle_tool_call, SharedState, ANALYZE_TOOL, HISTORY_DELETE_TOOL, HISTORY_GET_TOOL,
    HISTORY_LIST_TOOL,
};
use crate::analysis::AnalysisEvent;

/// Method name of analysis progress notifications.
pub const ANALYSIS_EVENT_METHOD: &str = "notifications/analysis_event";

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null if the request had none).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Server-to-client JSON-RPC notification.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<T: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: T,
}

impl<T: Serialize> JsonRpcNotification<T> {
    pub fn new(method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// MCP server information returned during initialization.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// The server name identifier.
    pub name: String,
    /// The server version string.
    pub version: String,
}

/// MCP server capabilities advertised to clients.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change dynamically.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the MCP initialize handshake.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    /// The MCP protocol version supported.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: Capabilities,
    /// Server identification information.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// MCP tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Unique tool name (used in tool calls).
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// The name of the tool to invoke.
    pub name: String,
    /// Optional arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// The content type (e.g., "text").
    #[serde(rename = "type")]
    pub content_type: String,
    /// The text content of the result.
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// The result content items.
    pub content: Vec<ToolResultContent>,
    /// Whether the result represents an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP server speaking line-delimited JSON-RPC 2.0.
pub struct McpServer {
    /// Shared application state.
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("MCP Decision Verdict Server starting...");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve requests from `reader` until EOF, writing to `writer`.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request, &mut writer).await?,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            // Notifications get no response
            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");
                write_line(&mut writer, &response_json).await?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC request
    /// Returns None for notifications (requests without id)
    async fn handle_request<W: AsyncWrite + Unpin>(
        &self,
        request: JsonRpcRequest,
        writer: &mut W,
    ) -> std::io::Result<Option<JsonRpcResponse>> {
        // Check if this is a notification (no id = no response required)
        let is_notification = request.id.is_none();

        let response = match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" => {
                debug!("Received initialized notification");
                None
            }
            "notifications/cancelled" => {
                debug!("Received cancelled notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(
                self.handle_tool_call(request.id, request.params, writer)
                    .await?,
            ),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                // For unknown methods, only respond if it's a request (has id)
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        };

        Ok(response)
    }

    /// Handle initialize request
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "mcp-decision-verdict".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "tools": tool_definitions()
            }),
        )
    }

    /// Handle tools/call request.
    ///
    /// Analysis events raised while the tool runs are written as
    /// notifications before the response.
    async fn handle_tool_call<W: AsyncWrite + Unpin>(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        writer: &mut W,
    ) -> std::io::Result<JsonRpcResponse> {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return Ok(JsonRpcResponse::error(
                        id,
                        -32602,
                        format!("Invalid params: {}", e),
                    ));
                }
            },
            None => {
                return Ok(JsonRpcResponse::error(id, -32602, "Missing params"));
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let (tx, mut rx) = mpsc::unbounded_channel::<AnalysisEvent>();
        let state = self.state.clone();
        let call = async move {
            let result = handle_tool_call(&state, &params.name, params.arguments, &tx).await;
            drop(tx);
            result
        };
        let forward = async {
            while let Some(event) = rx.recv().await {
                let notification = JsonRpcNotification::new(ANALYSIS_EVENT_METHOD, &event);
                write_line(&mut *writer, &serde_json::to_string(&notification)?).await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (result, forwarded) = tokio::join!(call, forward);
        forwarded?;

        let (content, is_error) = match result {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                    error!(error = %e, "Failed to serialize tool result");
                    format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                });
                (
                    ToolResultContent {
                        content_type: "text".to_string(),
                        text,
                    },
                    None,
                )
            }
            Err(e) => (
                ToolResultContent {
                    content_type: "text".to_string(),
                    text: format!("Error: {}", e),
                },
                Some(true),
            ),
        };

        let tool_result = ToolCallResult {
            content: vec![content],
            is_error,
        };

        Ok(match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        })
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Every tool the server exposes.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        get_analyze_tool(),
        get_history_list_tool(),
        get_history_get_tool(),
        get_history_delete_tool(),
    ]
}

/// Get the decision analysis tool definition
fn get_analyze_tool() -> Tool {
    Tool {
        name: ANALYZE_TOOL.to_string(),
        description: "Audit a decision with five specialists (logical, causal, risk, skeptic, stress) and return critical flaws, decision paths with robustness scores, and a synthesis.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "decision": {
                    "type": "string",
                    "description": "The decision being considered"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Optional reasoning behind the decision"
                },
                "stream": {
                    "type": "boolean",
                    "description": "Send notifications/analysis_event progress notifications while running (default: false)"
                }
            },
            "required": ["decision"],
            "additionalProperties": false
        }),
    }
}

/// Get the history list tool definition
fn get_history_list_tool() -> Tool {
    Tool {
        name: HISTORY_LIST_TOOL.to_string(),
        description: "List stored decision analyses, most recent first.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 100,
                    "description": "Maximum number of analyses to return (default: 20)"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Get the history get tool definition
fn get_history_get_tool() -> Tool {
    Tool {
        name: HISTORY_GET_TOOL.to_string(),
        description: "Fetch a stored decision analysis by ID.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Analysis ID" }
            },
            "required": ["id"],
            "additionalProperties": false
        }),
    }
}

/// Get the history delete tool definition
fn get_history_delete_tool() -> Tool {
    Tool {
        name: HISTORY_DELETE_TOOL.to_string(),
        description: "Delete a stored decision analysis by ID.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Analysis ID" }
            },
            "required": ["id"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonrpc_response_success_with_id() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"result": "ok"}));

        assert_eq!(response.jsonrpc, "2.0");
        assert_eq!(response.id, json!(1));
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["result"], "ok");
    }

    #[test]
    fn test_jsonrpc_response_error_without_id() {
        let response = JsonRpcResponse::error(None, -32700, "Parse error");

        assert_eq!(response.id, Value::Null);
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32700);
    }

    #[test]
    fn test_error_response_omits_result() {
        let value =
            serde_json::to_value(JsonRpcResponse::error(Some(json!(3)), -32601, "nope")).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["message"], "nope");
    }

    #[test]
    fn test_notification_shape() {
        let notification =
            JsonRpcNotification::new(ANALYSIS_EVENT_METHOD, AnalysisEvent::status("Synthesis"));
        let value = serde_json::to_value(&notification).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "notifications/analysis_event");
        assert_eq!(value["params"]["type"], "status");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_tool_definitions() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "decision_analyze",
                "decision_history_list",
                "decision_history_get",
                "decision_history_delete"
            ]
        );
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object");
        }
        assert_eq!(tools[0].input_schema["required"], json!(["decision"]));
    }

    #[test]
    fn test_tool_call_result_is_error_serialization() {
        let result = ToolCallResult {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text: "Error: x".to_string(),
            }],
            is_error: Some(true),
        };
        let value = serde_json::to_value(result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
    }
}
