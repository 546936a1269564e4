//! MCP protocol tests
//!
//! Drives the JSON-RPC server over in-memory streams with a canned model
//! backend and in-memory storage.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use mcp_decision_verdict::config::{
    AnalysisConfig, Config, DatabaseConfig, LangbaseConfig, LogFormat, LoggingConfig, PipeConfig,
    RequestConfig,
};
use mcp_decision_verdict::error::TransportError;
use mcp_decision_verdict::generation::{GenerationBackend, GenerationRequest};
use mcp_decision_verdict::server::{AppState, McpServer, ANALYSIS_EVENT_METHOD};
use mcp_decision_verdict::storage::{SqliteStorage, Storage};

/// Answers every step with a valid payload unless the step is listed as down.
struct CannedBackend {
    down: Option<&'static str>,
}

#[async_trait]
impl GenerationBackend for CannedBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, TransportError> {
        if self.down == Some(request.step.as_str()) {
            return Err(TransportError::Api {
                status: 500,
                message: "boom".to_string(),
            });
        }

        let answer = match request.step.as_str() {
            "orchestrator" => json!({
                "decision_summary": "Adopt a four-day week",
                "assumptions": ["Output stays constant"],
                "agent_tasks": {
                    "logical": "Check the argument",
                    "causal": "Trace second-order effects",
                    "risk": "List what could go wrong",
                    "skeptic": "Contest the logic",
                    "stress": "Amplify the risks"
                }
            }),
            "synthesis" => json!({
                "critical_flaws": [{ "title": "No pilot", "impact": "Irreversible", "evidence": [] }],
                "decision_paths": [{
                    "path": "Pilot in one team",
                    "valid_if": "Metrics are tracked",
                    "fails_if": "Clients need Friday coverage",
                    "robustness_score": 80
                }],
                "synthesis_summary": "Pilot first."
            }),
            _ => json!({
                "findings": [{ "point": "p", "explanation": "e", "severity": "medium" }]
            }),
        };
        Ok(answer.to_string())
    }
}

fn test_config(persist_analyses: bool) -> Config {
    Config {
        langbase: LangbaseConfig {
            api_key: "test-key".to_string(),
            base_url: "http://localhost".to_string(),
        },
        database: DatabaseConfig {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
            persist_analyses,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig {
            max_attempts: 1,
            ..RequestConfig::default()
        },
        pipes: PipeConfig::default(),
        analysis: AnalysisConfig::default(),
    }
}

async fn create_server(down: Option<&'static str>, persist_analyses: bool) -> McpServer {
    let storage = SqliteStorage::new_in_memory().await.unwrap();
    let state = AppState::new(
        test_config(persist_analyses),
        storage,
        Arc::new(CannedBackend { down }),
    )
    .unwrap();
    McpServer::new(Arc::new(state))
}

/// Feed raw lines to the server and return every line it wrote, parsed.
async fn exchange_raw(server: &McpServer, lines: &[String]) -> Vec<Value> {
    let input = lines.join("\n") + "\n";
    let mut output = Vec::new();
    server.serve(input.as_bytes(), &mut output).await.unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

async fn exchange(server: &McpServer, messages: &[Value]) -> Vec<Value> {
    let lines: Vec<String> = messages.iter().map(Value::to_string).collect();
    exchange_raw(server, &lines).await
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

/// Parse the JSON text payload of a successful tool result.
fn tool_payload(response: &Value) -> Value {
    assert!(response["result"].get("isError").is_none(), "{}", response);
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

fn tool_error_text(response: &Value) -> String {
    assert_eq!(response["result"]["isError"], true, "{}", response);
    response["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

mod protocol_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_initialize_handshake() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[
                json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
                json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            ],
        )
        .await;

        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], 1);
        assert_eq!(out[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(out[0]["result"]["serverInfo"]["name"], "mcp-decision-verdict");
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" })],
        )
        .await;

        let names: Vec<&str> = out[0]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "decision_analyze",
                "decision_history_list",
                "decision_history_get",
                "decision_history_delete"
            ]
        );
        assert_eq!(
            out[0]["result"]["tools"][0]["inputSchema"]["required"],
            json!(["decision"])
        );
    }

    #[tokio::test]
    async fn test_unknown_method_and_notification() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[
                json!({ "jsonrpc": "2.0", "method": "notifications/whatever" }),
                json!({ "jsonrpc": "2.0", "id": 9, "method": "resources/list" }),
                json!({ "jsonrpc": "2.0", "id": 10, "method": "ping" }),
            ],
        )
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 9);
        assert_eq!(out[0]["error"]["code"], -32601);
        assert_eq!(out[1]["id"], 10);
        assert_eq!(out[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error_keeps_serving() {
        let server = create_server(None, true).await;
        let out = exchange_raw(
            &server,
            &[
                "{ this is not json".to_string(),
                String::new(),
                json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" }).to_string(),
            ],
        )
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], Value::Null);
        assert_eq!(out[0]["error"]["code"], -32700);
        assert_eq!(out[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_tool_call_without_params() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call" })],
        )
        .await;

        assert_eq!(out[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_tool_error() {
        let server = create_server(None, true).await;
        let out = exchange(&server, &[tool_call(4, "decision_unknown", json!({}))]).await;

        assert!(tool_error_text(&out[0]).contains("decision_unknown"));
    }
}

mod analyze_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_analyze_returns_composite_result() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[tool_call(
                1,
                "decision_analyze",
                json!({ "decision": "Adopt a four-day week", "reasoning": "Retention" }),
            )],
        )
        .await;

        // Without streaming only the response is written.
        assert_eq!(out.len(), 1);
        let payload = tool_payload(&out[0]);
        assert!(payload["id"].as_str().is_some());
        assert!(payload["timestamp"].as_str().is_some());
        assert_eq!(
            payload["orchestration"]["decision_summary"],
            "Adopt a four-day week"
        );
        assert_eq!(payload["agents"].as_array().unwrap().len(), 5);
        assert_eq!(payload["agents"][3]["agent_name"], "skeptic");
        assert_eq!(payload["verdict"]["synthesis_summary"], "Pilot first.");
        assert_eq!(payload["verdict"]["decision_paths"][0]["robustness_score"], 80);
    }

    #[tokio::test]
    async fn test_streaming_writes_events_before_response() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[tool_call(
                2,
                "decision_analyze",
                json!({ "decision": "Adopt a four-day week", "stream": true }),
            )],
        )
        .await;

        let (response, notifications) = out.split_last().unwrap();
        assert_eq!(response["id"], 2);
        assert!(notifications
            .iter()
            .all(|n| n["method"] == ANALYSIS_EVENT_METHOD && n.get("id").is_none()));

        let kinds: Vec<&str> = notifications
            .iter()
            .map(|n| n["params"]["type"].as_str().unwrap())
            .filter(|kind| *kind != "status")
            .collect();
        assert_eq!(
            kinds,
            vec![
                "orchestration",
                "agent_result",
                "agent_result",
                "agent_result",
                "agent_result",
                "agent_result",
                "synthesis"
            ]
        );
        assert_eq!(notifications[0]["params"]["message"], "Initialization");

        let synthesis = notifications
            .iter()
            .find(|n| n["params"]["type"] == "synthesis")
            .unwrap();
        assert_eq!(
            synthesis["params"]["data"],
            tool_payload(response)["verdict"]
        );
    }

    #[tokio::test]
    async fn test_failed_stream_ends_with_error_event() {
        let server = create_server(Some("agent:causal"), true).await;
        let out = exchange(
            &server,
            &[tool_call(
                3,
                "decision_analyze",
                json!({ "decision": "Adopt a four-day week", "stream": true }),
            )],
        )
        .await;

        let (response, notifications) = out.split_last().unwrap();
        assert!(tool_error_text(response).contains("Foundation wave failed (causal)"));
        let last = notifications.last().unwrap();
        assert_eq!(last["params"]["type"], "error");
        assert!(!notifications
            .iter()
            .any(|n| n["params"]["type"] == "synthesis"));
    }

    #[tokio::test]
    async fn test_blank_decision_is_rejected() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[tool_call(4, "decision_analyze", json!({ "decision": "  " }))],
        )
        .await;

        assert!(tool_error_text(&out[0]).contains("decision"));
    }

    #[tokio::test]
    async fn test_missing_decision_is_invalid_parameters() {
        let server = create_server(None, true).await;
        let out = exchange(
            &server,
            &[tool_call(5, "decision_analyze", json!({ "reasoning": "why" }))],
        )
        .await;

        assert!(tool_error_text(&out[0]).contains("decision_analyze"));
    }
}

mod history_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn analyze(server: &McpServer, decision: &str) -> String {
        let out = exchange(
            server,
            &[tool_call(1, "decision_analyze", json!({ "decision": decision }))],
        )
        .await;
        tool_payload(&out[0])["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_history_lifecycle() {
        let server = create_server(None, true).await;
        let id = analyze(&server, "Adopt a four-day week").await;

        let out = exchange(
            &server,
            &[
                tool_call(2, "decision_history_list", json!({ "limit": 5 })),
                tool_call(3, "decision_history_get", json!({ "id": id })),
                tool_call(4, "decision_history_delete", json!({ "id": id })),
                tool_call(5, "decision_history_get", json!({ "id": id })),
                tool_call(6, "decision_history_delete", json!({ "id": id })),
            ],
        )
        .await;
        assert_eq!(out.len(), 5);

        let list = tool_payload(&out[0]);
        assert_eq!(list["count"], 1);
        assert_eq!(list["analyses"][0]["id"], json!(id));
        assert_eq!(list["analyses"][0]["critical_flaws"], 1);

        let fetched = tool_payload(&out[1]);
        assert_eq!(fetched["decision"], "Adopt a four-day week");
        assert_eq!(fetched["analysis"]["id"], json!(id));
        assert_eq!(fetched["analysis"]["verdict"]["synthesis_summary"], "Pilot first.");

        assert_eq!(tool_payload(&out[2]), json!({ "id": id, "deleted": true }));
        assert!(tool_error_text(&out[3]).contains(&id));
        assert!(tool_error_text(&out[4]).contains(&id));
    }

    #[tokio::test]
    async fn test_history_list_without_arguments() {
        let server = create_server(None, true).await;
        analyze(&server, "Hire two engineers").await;
        analyze(&server, "Move to a bigger office").await;

        let out = exchange(
            &server,
            &[json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": { "name": "decision_history_list" }
            })],
        )
        .await;

        assert_eq!(tool_payload(&out[0])["count"], 2);
    }

    #[tokio::test]
    async fn test_persistence_can_be_disabled() {
        let server = create_server(None, false).await;
        analyze(&server, "Adopt a four-day week").await;

        let out = exchange(&server, &[tool_call(2, "decision_history_list", json!({}))]).await;
        assert_eq!(tool_payload(&out[0])["count"], 0);
    }

    #[tokio::test]
    async fn test_invocations_are_logged() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let state = Arc::new(AppState::new(
            test_config(true),
            storage.clone(),
            Arc::new(CannedBackend { down: None }),
        )
        .unwrap());
        let server = McpServer::new(state);

        let id = analyze(&server, "Adopt a four-day week").await;
        exchange(&server, &[tool_call(2, "decision_analyze", json!({ "decision": "" }))]).await;

        let logged = storage.recent_invocations(10).await.unwrap();
        assert_eq!(logged.len(), 2);
        assert!(logged.iter().all(|i| i.tool_name == "decision_analyze"));

        let succeeded = logged.iter().find(|i| i.success).unwrap();
        assert_eq!(succeeded.analysis_id.as_deref(), Some(id.as_str()));
        let failed = logged.iter().find(|i| !i.success).unwrap();
        assert!(failed.error.as_deref().unwrap().contains("decision"));
    }
}
