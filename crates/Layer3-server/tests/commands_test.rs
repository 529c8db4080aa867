//! 명령 카탈로그 통합 테스트 - dispatcher → session / registry → simulated bot
//!
//! `cargo test -p mcbot-server --test commands_test`

use mcbot_core::mcp::{CallToolResult, Content};
use mcbot_core::session::sim::{SimOptions, SimulatedConnector};
use mcbot_core::{SessionLimits, SessionManager};
use mcbot_foundation::{AuthMode, ConnectionConfig};
use mcbot_server::{CommandContext, Dispatcher};
use mcbot_task::{ScriptSandbox, TaskRegistry};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    dispatcher: Dispatcher,
    connector: Arc<SimulatedConnector>,
}

impl Harness {
    fn new(options: SimOptions, eval_timeout: Duration) -> Self {
        let connector = Arc::new(SimulatedConnector::new(options));
        let session = SessionManager::spawn(
            connector.clone(),
            SessionLimits {
                connect_timeout: Duration::from_secs(5),
                world_wait: Duration::from_millis(50),
            },
        );
        let tasks = TaskRegistry::new(
            session.clone(),
            Arc::new(ScriptSandbox::default()),
            eval_timeout,
        );
        let defaults = ConnectionConfig {
            auth: AuthMode::Offline,
            ..ConnectionConfig::default()
        };
        Self {
            dispatcher: Dispatcher::with_builtins(CommandContext::new(session, tasks, defaults)),
            connector,
        }
    }

    async fn connected() -> Self {
        let harness = Self::new(SimOptions::default(), Duration::from_secs(5));
        let result = harness.call("connect", json!({})).await;
        assert!(!result.is_error, "{:?}", result);
        harness
    }

    async fn call(&self, name: &str, args: Value) -> CallToolResult {
        self.dispatcher.dispatch(name, args).await
    }

    async fn text(&self, name: &str, args: Value) -> String {
        self.call(name, args)
            .await
            .first_text()
            .unwrap_or_default()
            .to_string()
    }

    /// Start a background eval and return its task id
    async fn background(&self, code: &str) -> String {
        let text = self
            .text("eval", json!({"code": code, "background": true}))
            .await;
        text.lines()
            .find_map(|line| line.strip_prefix("Task ID: "))
            .expect("task id line")
            .to_string()
    }

    async fn wait_for_status(&self, id: &str, status: &str) -> String {
        let needle = format!("Status: {}\n", status);
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let text = self.text("get_task", json!({"task_id": id})).await;
                if text.contains(&needle) {
                    return text;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("task never reached status")
    }
}

// ============================================================================
// connect / disconnect
// ============================================================================

#[tokio::test]
async fn test_connect_lifecycle() {
    let harness = Harness::new(SimOptions::default(), Duration::from_secs(5));

    let result = harness
        .call("connect", json!({"host": "mc.local", "port": 25570, "username": "digger"}))
        .await;
    assert!(!result.is_error);
    assert_eq!(
        result.first_text(),
        Some("Connected to mc.local:25570 as digger. Bot is ready (version 1.20.4). Viewer on port 3000.")
    );

    // 두 번째 connect 는 에러가 아닌 안내
    let again = harness.call("connect", json!({})).await;
    assert!(!again.is_error);
    assert_eq!(
        again.first_text(),
        Some("Bot is already connected. Use disconnect first.")
    );
    let status = harness.text("status", json!({})).await;
    assert!(status.starts_with("Session: ready\nBackend: simulated"), "{}", status);
    assert!(status.contains("Server: mc.local:25570 as digger (offline)"));

    assert_eq!(
        harness.text("disconnect", json!({})).await,
        "Disconnected from server."
    );
    assert!(harness.connector.last_bot().unwrap().has_quit());

    let result = harness.call("disconnect", json!({})).await;
    assert!(!result.is_error);
    assert_eq!(result.first_text(), Some("Bot is not connected."));
}

#[tokio::test]
async fn test_connect_kicked() {
    let harness = Harness::new(
        SimOptions {
            kick_reason: Some("banned".to_string()),
            ..SimOptions::default()
        },
        Duration::from_secs(5),
    );

    let result = harness.call("connect", json!({})).await;
    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        Some("Connection error: Kicked from server: banned")
    );
    assert!(harness
        .text("status", json!({}))
        .await
        .starts_with("Session: idle"));
}

// ============================================================================
// eval / eval_file
// ============================================================================

#[tokio::test]
async fn test_eval_requires_connection() {
    let harness = Harness::new(SimOptions::default(), Duration::from_secs(5));

    let result = harness.call("eval", json!({"code": "return 1+1"})).await;
    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        Some("Bot is not connected. Use connect tool first.")
    );
    assert_eq!(harness.text("list_tasks", json!({})).await, "No tasks found.");
}

#[tokio::test]
async fn test_eval_sync() {
    let harness = Harness::connected().await;

    let result = harness.call("eval", json!({"code": "return 1+1"})).await;
    assert_eq!(result, CallToolResult::text("Result:\n2"));

    let result = harness
        .call("eval", json!({"code": "bot.chat('hi')\nthrow new Error('nope')"}))
        .await;
    assert!(result.is_error);
    let text = result.first_text().unwrap();
    assert!(text.starts_with("Eval error: nope\n"), "{}", text);
    assert!(text.contains("<script>"), "{}", text);
    assert_eq!(
        harness.connector.last_bot().unwrap().chat_log(),
        vec!["hi".to_string()]
    );
}

#[tokio::test]
async fn test_eval_timeout() {
    let harness = Harness::new(SimOptions::default(), Duration::from_millis(100));
    harness.call("connect", json!({})).await;

    let result = harness.call("eval", json!({"code": "sleep(5000)"})).await;
    assert!(result.is_error);
    assert_eq!(
        result.first_text(),
        Some("Eval error: Eval timed out after 0s. Use background=true for long-running tasks.")
    );
}

#[tokio::test]
async fn test_eval_file() {
    let harness = Harness::connected().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("walk.js");
    std::fs::write(&path, "const p = bot.entity.position\nreturn p.y").unwrap();
    let path = path.to_string_lossy().to_string();

    assert_eq!(
        harness.text("eval_file", json!({"file_path": path})).await,
        format!("File: {}\nResult:\n64", path)
    );

    let text = harness
        .text("eval_file", json!({"file_path": path, "background": true}))
        .await;
    assert!(text.starts_with(&format!("Task started from file: {}\nTask ID: task_1_", path)));

    let id = text
        .lines()
        .find_map(|line| line.strip_prefix("Task ID: "))
        .unwrap()
        .to_string();
    let detail = harness.wait_for_status(&id, "completed").await;
    assert!(detail.contains(&format!("Code: [file: {}]\nconst p", path)), "{}", detail);
    assert!(detail.ends_with("\nResult:\n64"));

    let missing = dir.path().join("missing.js").to_string_lossy().to_string();
    let result = harness.call("eval_file", json!({"file_path": missing})).await;
    assert!(result.is_error);
    assert!(result
        .first_text()
        .unwrap()
        .starts_with("Failed to read file:"));

    let bad = dir.path().join("bad.js");
    std::fs::write(&bad, "throw new Error('bad file')").unwrap();
    let bad = bad.to_string_lossy().to_string();
    let text = harness.text("eval_file", json!({"file_path": bad})).await;
    assert!(text.starts_with(&format!("Eval error in {}: bad file\n", bad)), "{}", text);
}

// ============================================================================
// tasks
// ============================================================================

#[tokio::test]
async fn test_background_task_flow() {
    let harness = Harness::connected().await;

    let text = harness
        .text("eval", json!({"code": "sleep(100)\nreturn \"done\"", "background": true}))
        .await;
    assert!(text.starts_with("Task started in background.\nTask ID: task_1_"));
    assert!(text.ends_with("\nUse get_task to check status."));
    let id = text
        .lines()
        .find_map(|line| line.strip_prefix("Task ID: "))
        .unwrap()
        .to_string();

    let running = harness.text("get_task", json!({"task_id": id})).await;
    assert!(running.contains("Status: running\n"));
    assert!(running.contains("s (running)\n"));

    let done = harness.wait_for_status(&id, "completed").await;
    assert!(done.ends_with("\nResult:\ndone"), "{}", done);

    let result = harness.call("get_task", json!({"task_id": "task_99_1"})).await;
    assert!(result.is_error);
    assert_eq!(result.first_text(), Some("Task not found: task_99_1"));
}

#[tokio::test]
async fn test_cancel_task() {
    let harness = Harness::connected().await;

    let id = harness
        .background("bot.pathfinder.setGoal(new goals.GoalXZ(50, 50))\nwhile (true) { sleep(10) }")
        .await;
    let bot = harness.connector.last_bot().unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while bot.goal().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let text = harness.text("cancel_task", json!({"task_id": id})).await;
    assert!(text.starts_with(&format!("Task {} cancelled after ", id)), "{}", text);
    assert!(text.ends_with("s.\nPathfinder goals stopped."));
    assert!(bot.goal().is_none());

    let again = harness.call("cancel_task", json!({"task_id": id})).await;
    assert!(again.is_error);
    assert_eq!(
        again.first_text().unwrap(),
        format!("Task {} is not running (status: cancelled)", id)
    );

    let result = harness.call("cancel_task", json!({"task_id": "task_42_0"})).await;
    assert_eq!(result.first_text(), Some("Task not found: task_42_0"));
}

#[tokio::test]
async fn test_cancel_settled_task_is_rejected() {
    let harness = Harness::connected().await;
    let done = harness.background("return 42").await;
    let failed = harness.background("throw new Error('boom')").await;

    for (id, status) in [(&done, "completed"), (&failed, "error")] {
        let before = harness.wait_for_status(id, status).await;

        let result = harness.call("cancel_task", json!({"task_id": id})).await;
        assert!(result.is_error);
        assert_eq!(
            result.first_text().unwrap(),
            format!("Task {} is not running (status: {})", id, status)
        );

        // status, result and completion time are untouched
        assert_eq!(harness.text("get_task", json!({"task_id": id})).await, before);
    }
}

#[tokio::test]
async fn test_list_tasks() {
    let harness = Harness::connected().await;

    let first = harness.background("return 1").await;
    let failed = harness.background("throw new Error('x')").await;
    let third = harness.background("return 3").await;
    harness.wait_for_status(&first, "completed").await;
    harness.wait_for_status(&failed, "error").await;
    harness.wait_for_status(&third, "completed").await;

    let text = harness
        .text("list_tasks", json!({"status": "completed"}))
        .await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Tasks (2):");
    assert!(lines[1].starts_with(&format!("- {}: completed (", first)));
    assert!(lines[1].ends_with(") - return 1"));
    assert!(lines[2].starts_with(&format!("- {}: completed (", third)));

    assert_eq!(
        harness.text("list_tasks", json!({"status": "cancelled"})).await,
        "No tasks found with status: cancelled."
    );
    assert!(harness
        .text("list_tasks", json!({"status": "all"}))
        .await
        .starts_with("Tasks (3):"));

    let result = harness.call("list_tasks", json!({"status": "paused"})).await;
    assert!(result.is_error);

    let status = harness.text("status", json!({})).await;
    assert!(status.ends_with("Tasks: 3 total (0 running, 2 completed, 1 error, 0 cancelled)"));
}

// ============================================================================
// screenshot
// ============================================================================

#[tokio::test]
async fn test_screenshot() {
    let harness = Harness::connected().await;

    let result = harness.call("screenshot", json!({"width": 64, "height": 32})).await;
    match &result.content[0] {
        Content::Image { data, mime_type } => {
            assert_eq!(mime_type, "image/jpeg");
            assert!(!data.is_empty());
        }
        other => panic!("expected image, got {:?}", other),
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shots").join("view.jpg");
    let path_text = path.to_string_lossy().to_string();
    assert_eq!(
        harness
            .text("screenshot", json!({"output_path": path_text}))
            .await,
        format!("Screenshot saved to {}", path_text)
    );
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}
