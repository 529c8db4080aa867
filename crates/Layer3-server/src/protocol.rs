//! MCP protocol handler
//!
//! Maps JSON-RPC messages onto the [`Dispatcher`]:
//! `initialize`, `notifications/initialized`, `ping`, `tools/list`,
//! `tools/call`. Anything else gets `-32601`; unparsable input `-32700`.

use crate::dispatcher::Dispatcher;
use mcbot_core::mcp::{
    CommandCall, JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Server name reported by `initialize`
pub const SERVER_NAME: &str = "mcbot";

/// MCP server: protocol layer over one shared dispatcher
#[derive(Clone)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one raw message; `None` means nothing to send back
    pub async fn handle_message(&self, text: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparsable message: {}", e);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::parse_error(),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!("Invalid request: {}", e);
                Some(JsonRpcResponse::failure(id, JsonRpcError::invalid_request()))
            }
        }
    }

    /// Handle a decoded request or notification
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, id = ?request.id, "MCP request");

        let Some(id) = request.id.clone() else {
            // 알림은 응답하지 않음
            if request.method != "notifications/initialized" {
                debug!(method = %request.method, "Ignoring notification");
            }
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.dispatcher.descriptors() })),
            "tools/call" => self.call_tool(request.params).await,
            _ => Err(JsonRpcError::method_not_found()),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let client = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client = %client, "MCP client initialized");

        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let call: CommandCall = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tools/call params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
            })?;

        let result = self.dispatcher.dispatch(&call.name, call.arguments).await;
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandContext;
    use mcbot_core::session::sim::{SimOptions, SimulatedConnector};
    use mcbot_core::{SessionLimits, SessionManager};
    use mcbot_foundation::ConnectionConfig;
    use mcbot_task::{ScriptSandbox, TaskRegistry};
    use std::time::Duration;

    fn server() -> McpServer {
        let session = SessionManager::spawn(
            Arc::new(SimulatedConnector::new(SimOptions::default())),
            SessionLimits {
                connect_timeout: Duration::from_secs(5),
                world_wait: Duration::from_millis(50),
            },
        );
        let tasks = TaskRegistry::new(
            session.clone(),
            Arc::new(ScriptSandbox::default()),
            Duration::from_secs(5),
        );
        McpServer::new(Dispatcher::with_builtins(CommandContext::new(
            session,
            tasks,
            ConnectionConfig::default(),
        )))
    }

    async fn call(server: &McpServer, text: &str) -> Value {
        let response = server.handle_message(text).await.expect("response");
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"test"}}}"#,
        )
        .await;
        assert_eq!(response["id"], json!(1));
        assert_eq!(response["result"]["serverInfo"]["name"], json!("mcbot"));
        assert_eq!(response["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server();
        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_errors() {
        let server = server();

        let response = call(&server, "{not json").await;
        assert_eq!(response["error"]["code"], json!(-32700));
        assert_eq!(response["id"], Value::Null);

        let response = call(&server, r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#).await;
        assert_eq!(response["error"]["code"], json!(-32601));
        assert_eq!(response["id"], json!("a"));

        let response = call(&server, r#"{"jsonrpc":"2.0","id":3,"method":"tools/call"}"#).await;
        assert_eq!(response["error"]["code"], json!(-32602));

        let response = call(&server, r#"{"jsonrpc":"2.0","id":4,"params":{}}"#).await;
        assert_eq!(response["error"]["code"], json!(-32600));
        assert_eq!(response["id"], json!(4));
    }

    #[tokio::test]
    async fn test_tools_list_and_call() {
        let server = server();

        let response = call(&server, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 9);
        assert_eq!(tools[0]["name"], json!("connect"));
        assert!(tools[0]["inputSchema"]["properties"]["host"].is_object());

        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"eval","arguments":{"code":"return 1"}}}"#,
        )
        .await;
        assert_eq!(
            response["result"],
            json!({
                "content": [{"type": "text", "text": "Bot is not connected. Use connect tool first."}],
                "isError": true
            })
        );

        let response = call(&server, r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#).await;
        assert_eq!(response["result"], json!({}));
    }
}
