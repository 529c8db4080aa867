//! HTTP transport 통합 테스트 - 실제 소켓 위에서 stateless 동작 검증
//!
//! `cargo test -p mcbot-server --test http_test`

use mcbot_core::session::sim::{SimOptions, SimulatedConnector};
use mcbot_core::{SessionLimits, SessionManager};
use mcbot_foundation::{AuthMode, ConnectionConfig};
use mcbot_server::{router, CommandContext, Dispatcher, McpServer};
use mcbot_task::{ScriptSandbox, TaskRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Serve on an ephemeral port and return the `/mcp` URL
async fn start() -> String {
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
    let defaults = ConnectionConfig {
        auth: AuthMode::Offline,
        ..ConnectionConfig::default()
    };
    let server = McpServer::new(Dispatcher::with_builtins(CommandContext::new(
        session, tasks, defaults,
    )));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(server)).await.unwrap();
    });
    format!("http://{}/mcp", addr)
}

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

#[tokio::test]
async fn test_requests_share_state() {
    let url = start().await;
    let client = reqwest::Client::new();

    let response: Value = client
        .post(&url)
        .json(&call(1, "connect", json!({})))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Connected to localhost:25565 as mcp-bot."), "{}", text);

    // 별도 요청이지만 같은 세션을 사용
    let response: Value = client
        .post(&url)
        .json(&call(2, "eval", json!({"code": "return 1+1"})))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["id"], json!(2));
    assert_eq!(
        response["result"]["content"][0]["text"],
        json!("Result:\n2")
    );
}

#[tokio::test]
async fn test_notification_and_parse_error() {
    let url = start().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&url)
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    assert!(response.text().await.unwrap().is_empty());

    let response: Value = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{oops")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], json!(-32700));
}

#[tokio::test]
async fn test_get_and_delete_not_allowed() {
    let url = start().await;
    let client = reqwest::Client::new();

    for response in [
        client.get(&url).send().await.unwrap(),
        client.delete(&url).send().await.unwrap(),
    ] {
        assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"error": "Method not allowed in stateless mode"}));
    }
}
