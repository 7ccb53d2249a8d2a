//! MCP (Model Context Protocol) stdio server.
//!
//! Each line on stdin is a JSON-RPC 2.0 request and each response is written
//! as one line on stdout. Handled methods:
//! - `initialize` returns capabilities and server info
//! - `notifications/initialized` and other notifications get no response
//! - `ping` returns an empty result
//! - `tools/list` enumerates the registered WhatsApp tools
//! - `tools/call` runs a tool through [`ActionRegistry::execute_action`]

use crate::actions::{ActionError, ActionRegistry};
use crate::client::WhatsAppClient;
use crate::core::BrowserTrait;
use crate::errors::ChatAgentError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "whatsapp-ragent";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

// Application-specific error codes.
pub const TOOL_NOT_FOUND: i64 = -32000;
pub const TOOL_EXECUTION_ERROR: i64 = -32002;

/// Serves the WhatsApp tools to an MCP client over a line-oriented stream.
///
/// Tool failures that the tools themselves report (not logged in, chat not
/// found, ...) come back as a normal result with `isError: true`; only
/// protocol problems and unknown tools become JSON-RPC errors.
pub struct McpServer<B: BrowserTrait + 'static> {
    registry: ActionRegistry<B>,
    client: WhatsAppClient<B>,
    default_headless: bool,
}

impl<B: BrowserTrait + 'static> McpServer<B> {
    /// `connect_whatsapp` calls that omit `headless` use the client's
    /// configured `browser.headless`.
    pub fn new(registry: ActionRegistry<B>, client: WhatsAppClient<B>) -> Self {
        let default_headless = client.config().browser.headless;
        Self {
            registry,
            client,
            default_headless,
        }
    }

    pub fn client(&self) -> &WhatsAppClient<B> {
        &self.client
    }

    /// Read requests until `stdin` reaches EOF.
    pub async fn run(
        &mut self,
        stdin: impl AsyncBufRead + Unpin,
        mut stdout: impl AsyncWrite + Unpin,
    ) -> Result<()> {
        let mut lines = stdin.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "unparsable request");
                    let response =
                        JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error");
                    write_response(&mut stdout, &response).await?;
                    continue;
                }
            };

            let Some(id) = request.id.clone() else {
                debug!(method = %request.method, "notification");
                continue;
            };

            if request.jsonrpc != "2.0" {
                let response = JsonRpcResponse::failure(
                    id,
                    INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                );
                write_response(&mut stdout, &response).await?;
                continue;
            }

            let response = match request.method.as_str() {
                "initialize" => self.handle_initialize(id),
                "ping" => JsonRpcResponse::success(id, json!({})),
                "tools/list" => self.handle_tools_list(id),
                "tools/call" => self.handle_tools_call(id, request.params).await,
                other => JsonRpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                ),
            };

            write_response(&mut stdout, &response).await?;
        }

        info!("stdin closed");
        Ok(())
    }

    /// Close the browser, if one was launched.
    pub async fn shutdown(&mut self) {
        self.client.disconnect().await;
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools: Vec<Value> = self
            .registry
            .get_all_metadata()
            .into_iter()
            .map(|meta| {
                json!({
                    "name": meta.name,
                    "description": meta.description,
                    "inputSchema": meta.parameter_schema,
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&mut self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::failure(id, INVALID_PARAMS, "Missing params for tools/call");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                "Missing 'name' in tools/call params",
            );
        };

        let mut arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        if name == "connect_whatsapp" {
            if let Value::Object(map) = &mut arguments {
                map.entry("headless")
                    .or_insert(Value::Bool(self.default_headless));
            }
        }

        info!(tool = name, "executing tool");
        match self
            .registry
            .execute_action(name, arguments, &mut self.client)
            .await
        {
            Ok(result) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{
                        "type": "text",
                        "text": result.message,
                    }],
                    "isError": !result.success,
                }),
            ),
            Err(e) => {
                let code = match &e {
                    ChatAgentError::ActionError(ActionError::ActionNotFound(_)) => TOOL_NOT_FOUND,
                    ChatAgentError::ActionError(ActionError::InvalidParameters(_)) => {
                        INVALID_PARAMS
                    }
                    _ => TOOL_EXECUTION_ERROR,
                };
                warn!(tool = name, error = %e, "tool call failed");
                JsonRpcResponse::failure(id, code, e.to_string())
            }
        }
    }
}

async fn write_response(
    writer: &mut (impl AsyncWrite + Unpin),
    response: &JsonRpcResponse,
) -> Result<()> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::testing::{fixtures, FakeBrowser};

    fn server(browser: &FakeBrowser, headless: bool) -> McpServer<FakeBrowser> {
        let dir = std::env::temp_dir().join(format!("wa-mcp-{}", uuid::Uuid::new_v4()));
        let mut config = Config::instant().with_session_dir(dir);
        config.browser.headless = headless;
        let client = WhatsAppClient::new(browser.clone(), config);
        McpServer::new(ActionRegistry::with_whatsapp_tools(), client)
    }

    async fn run_server(server: &mut McpServer<FakeBrowser>, requests: &[Value]) -> Vec<String> {
        let mut input = String::new();
        for request in requests {
            input.push_str(&request.to_string());
            input.push('\n');
        }

        let stdin = tokio::io::BufReader::new(std::io::Cursor::new(input.into_bytes()));
        let mut stdout: Vec<u8> = Vec::new();
        server.run(stdin, &mut stdout).await.unwrap();

        String::from_utf8(stdout)
            .unwrap()
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect()
    }

    fn parse(line: &str) -> JsonRpcResponse {
        serde_json::from_str(line).unwrap()
    }

    fn call(id: u64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments },
            "id": id
        })
    }

    #[tokio::test]
    async fn initialize_handshake() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[], None));
        let mut server = server(&browser, false);

        let lines = run_server(
            &mut server,
            &[
                json!({ "jsonrpc": "2.0", "method": "initialize", "params": {}, "id": 1 }),
                json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            ],
        )
        .await;

        // The notification gets no reply.
        assert_eq!(lines.len(), 1);
        let response = parse(&lines[0]);
        assert_eq!(response.id, json!(1));
        let result = response.result.unwrap();
        assert!(result["capabilities"].get("tools").is_some());
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_exposes_registry_metadata() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[], None));
        let mut server = server(&browser, false);

        let lines = run_server(
            &mut server,
            &[json!({ "jsonrpc": "2.0", "method": "tools/list", "id": "a" })],
        )
        .await;

        let result = parse(&lines[0]).result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec!["connect_whatsapp", "list_chats", "read_messages", "send_message"]
        );
        assert_eq!(tools[2]["inputSchema"]["required"], json!(["chatName"]));
    }

    #[tokio::test]
    async fn tools_call_returns_text_content() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[("Alice", "see you")], None));
        let mut server = server(&browser, false);

        let lines = run_server(
            &mut server,
            &[
                call(1, "connect_whatsapp", json!({})),
                call(2, "list_chats", json!({ "limit": 5 })),
            ],
        )
        .await;

        assert_eq!(lines.len(), 2);
        let result = parse(&lines[1]).result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["type"], "text");
        let chats: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(chats[0]["title"], "Alice");
        assert_eq!(chats[0]["lastMsg"], "see you");
    }

    #[tokio::test]
    async fn tool_failure_is_a_result_not_a_protocol_error() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[], None));
        let mut server = server(&browser, false);

        let lines = run_server(&mut server, &[call(7, "list_chats", json!({}))]).await;

        let response = parse(&lines[0]);
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error listing chats: "));
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments_are_errors() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[], None));
        let mut server = server(&browser, false);

        let lines = run_server(
            &mut server,
            &[
                call(1, "delete_chat", json!({})),
                call(2, "send_message", json!({ "chatName": "", "message": "hi" })),
                json!({ "jsonrpc": "2.0", "method": "tools/call", "id": 3 }),
            ],
        )
        .await;

        let codes: Vec<_> = lines
            .iter()
            .map(|l| parse(l).error.unwrap().code)
            .collect();
        assert_eq!(codes, vec![TOOL_NOT_FOUND, INVALID_PARAMS, INVALID_PARAMS]);
        assert!(browser.typed_segments().is_empty());
    }

    #[tokio::test]
    async fn malformed_lines_and_unknown_methods() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[], None));
        let mut server = server(&browser, false);

        let input = "not json\n{\"jsonrpc\":\"2.0\",\"method\":\"resources/list\",\"id\":9}\n";
        let stdin = tokio::io::BufReader::new(std::io::Cursor::new(input.as_bytes().to_vec()));
        let mut stdout: Vec<u8> = Vec::new();
        server.run(stdin, &mut stdout).await.unwrap();

        let output = String::from_utf8(stdout).unwrap();
        let responses: Vec<_> = output.lines().map(parse).collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, Value::Null);
        assert_eq!(responses[0].error.as_ref().unwrap().code, PARSE_ERROR);
        assert_eq!(responses[1].error.as_ref().unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn configured_headless_fills_in_missing_argument() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[], None));
        let mut server = server(&browser, true);

        run_server(
            &mut server,
            &[
                call(1, "connect_whatsapp", json!({})),
                call(2, "connect_whatsapp", json!({ "headless": false })),
            ],
        )
        .await;

        assert_eq!(browser.launched_headless(), vec![true, false]);
        server.shutdown().await;
        assert_eq!(browser.active_sessions(), 0);
    }

    #[tokio::test]
    async fn empty_input_exits_cleanly() {
        let browser = FakeBrowser::new(fixtures::logged_in_page(&[], None));
        let mut server = server(&browser, false);

        let lines = run_server(&mut server, &[]).await;
        assert!(lines.is_empty());
        assert!(!server.client().session().is_connected());
    }
}
