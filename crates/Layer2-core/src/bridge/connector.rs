//! Bridge connector - 외부 게임 클라이언트 프로세스
//!
//! The bridge owns the real protocol client. We drive it with JSON-RPC
//! requests and receive lifecycle events as notifications.

use super::transport::BridgeTransport;
use crate::mcp::JsonRpcRequest;
use crate::session::{
    BotConnection, BotConnector, BotEvent, BotHandle, ConnectParams, GameData, Goal,
    MovementConfig, ScreenshotRequest,
};
use async_trait::async_trait;
use base64::Engine;
use mcbot_foundation::{BackendConfig, Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 브리지 기본 실행 명령
pub const DEFAULT_BRIDGE_COMMAND: &str = "mcbot-bridge";

const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(60);
const QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawns one bridge process per connection
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl BridgeConnector {
    pub fn new(command: impl Into<String>, args: Vec<String>, env: HashMap<String, String>) -> Self {
        Self {
            command: command.into(),
            args,
            env,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            config
                .command
                .clone()
                .unwrap_or_else(|| DEFAULT_BRIDGE_COMMAND.to_string()),
            config.args.clone(),
            config.env.clone(),
        )
    }
}

#[async_trait]
impl BotConnector for BridgeConnector {
    fn name(&self) -> &'static str {
        "bridge"
    }

    async fn open(&self, params: &ConnectParams) -> Result<BotConnection> {
        let (transport, notifications) =
            BridgeTransport::spawn(&self.command, &self.args, &self.env).await?;
        let transport = Arc::new(transport);

        let (events_tx, events) = mpsc::channel(16);
        tokio::spawn(forward_events(notifications, events_tx));

        let connect = json!({
            "host": params.host,
            "port": params.port,
            "username": params.username,
            "password": params.password,
            "auth": params.auth.as_str(),
            "viewerPort": params.viewer_port,
        });
        if let Err(e) = transport.request("bot/connect", Some(connect)).await {
            let _ = transport.close().await;
            return Err(match e {
                Error::Execution { message, .. } => Error::Connection(message),
                other => other,
            });
        }

        Ok(BotConnection {
            handle: Arc::new(BridgeBot {
                transport,
                username: params.username.clone(),
            }),
            events,
        })
    }
}

/// 브리지 알림 → BotEvent
async fn forward_events(
    mut notifications: mpsc::Receiver<JsonRpcRequest>,
    events: mpsc::Sender<BotEvent>,
) {
    while let Some(notification) = notifications.recv().await {
        let Some(event) = to_event(&notification) else {
            debug!("Unhandled bridge notification: {}", notification.method);
            continue;
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

fn to_event(notification: &JsonRpcRequest) -> Option<BotEvent> {
    let text = |key: &str| {
        notification
            .params
            .as_ref()
            .and_then(|p| p.get(key))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    };

    match notification.method.as_str() {
        "bot/spawn" => Some(BotEvent::Spawned),
        "bot/error" => Some(BotEvent::Error(text("message"))),
        "bot/kicked" => Some(BotEvent::Kicked(text("reason"))),
        "bot/end" => Some(BotEvent::Ended(text("reason"))),
        _ => None,
    }
}

/// Handle backed by the bridge process
pub struct BridgeBot {
    transport: Arc<BridgeTransport>,
    username: String,
}

#[async_trait]
impl BotHandle for BridgeBot {
    fn username(&self) -> &str {
        &self.username
    }

    async fn version(&self) -> Result<String> {
        let version = self.get("version").await?;
        version
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Protocol("Bridge reported no game version".to_string()))
    }

    async fn load_movement(&self) -> Result<()> {
        self.transport.request("pathfinder/load", None).await?;
        Ok(())
    }

    async fn load_game_data(&self, version: &str) -> Result<GameData> {
        let data = self
            .transport
            .request("data/load", Some(json!({ "version": version })))
            .await?;
        Ok(GameData {
            version: version.to_string(),
            data,
        })
    }

    async fn wait_for_world(&self) -> Result<()> {
        self.transport
            .request_with_timeout("world/waitForChunks", None, None)
            .await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.transport
            .request("bot/get", Some(json!({ "path": path })))
            .await
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.transport
            .request_with_timeout(
                "bot/call",
                Some(json!({ "method": method, "args": args })),
                None,
            )
            .await
    }

    async fn set_goal(&self, goal: Option<Goal>, dynamic: bool) -> Result<()> {
        self.transport
            .request(
                "pathfinder/setGoal",
                Some(json!({ "goal": goal, "dynamic": dynamic })),
            )
            .await?;
        Ok(())
    }

    async fn goto(&self, goal: Goal) -> Result<()> {
        self.transport
            .request_with_timeout("pathfinder/goto", Some(json!({ "goal": goal })), None)
            .await?;
        Ok(())
    }

    async fn stop_goal(&self) -> Result<()> {
        self.transport.request("pathfinder/stop", None).await?;
        Ok(())
    }

    async fn set_movements(&self, movements: MovementConfig) -> Result<()> {
        self.transport
            .request(
                "pathfinder/setMovements",
                Some(json!({ "movements": movements })),
            )
            .await?;
        Ok(())
    }

    async fn is_moving(&self) -> Result<bool> {
        let moving = self.transport.request("pathfinder/isMoving", None).await?;
        Ok(moving.as_bool().unwrap_or(false))
    }

    async fn screenshot(&self, request: &ScreenshotRequest) -> Result<Vec<u8>> {
        let result = self
            .transport
            .request_with_timeout(
                "render/screenshot",
                Some(serde_json::to_value(request)?),
                Some(SCREENSHOT_TIMEOUT),
            )
            .await?;

        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("Screenshot response has no data".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::Protocol(format!("Invalid screenshot data: {}", e)))
    }

    async fn quit(&self) -> Result<()> {
        if self.transport.is_connected() {
            if let Err(e) = self
                .transport
                .request_with_timeout("bot/quit", None, Some(QUIT_TIMEOUT))
                .await
            {
                warn!("Bridge quit request failed: {}", e);
            }
        }
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcbot_foundation::BackendKind;

    #[test]
    fn test_notification_mapping() {
        let spawn = JsonRpcRequest::notification("bot/spawn", None);
        assert_eq!(to_event(&spawn), Some(BotEvent::Spawned));

        let kicked =
            JsonRpcRequest::notification("bot/kicked", Some(json!({"reason": {"text": "bye"}})));
        assert_eq!(
            to_event(&kicked),
            Some(BotEvent::Kicked(r#"{"text":"bye"}"#.to_string()))
        );

        let ended = JsonRpcRequest::notification("bot/end", Some(json!({"reason": "socketClosed"})));
        assert_eq!(
            to_event(&ended),
            Some(BotEvent::Ended("socketClosed".to_string()))
        );

        assert!(to_event(&JsonRpcRequest::notification("bot/chat", None)).is_none());
    }

    #[test]
    fn test_from_config_default_command() {
        let config = BackendConfig {
            kind: BackendKind::Bridge,
            ..BackendConfig::default()
        };
        let connector = BridgeConnector::from_config(&config);
        assert_eq!(connector.command, DEFAULT_BRIDGE_COMMAND);
    }

    #[tokio::test]
    async fn test_missing_bridge_binary() {
        let connector = BridgeConnector::new(
            "/nonexistent/mcbot-bridge-for-tests",
            vec![],
            HashMap::new(),
        );
        let params = ConnectParams {
            host: "localhost".to_string(),
            port: 25565,
            username: "mcp-bot".to_string(),
            password: None,
            auth: mcbot_foundation::AuthMode::Offline,
            viewer_port: 3000,
        };
        let err = connector.open(&params).await.unwrap_err();
        assert_eq!(err.kind(), "ConnectionError");
    }
}
