//! Game client collaborator interface
//!
//! The session manager never talks to the game protocol directly. It goes
//! through a [`BotConnector`] that opens a [`BotConnection`]: a handle for
//! queries and actions plus a stream of lifecycle events.

use super::goal::{Goal, MovementConfig, Vec3};
use async_trait::async_trait;
use mcbot_foundation::{AuthMode, ConnectionConfig, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 접속 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub auth: AuthMode,
    pub viewer_port: u16,
}

impl From<&ConnectionConfig> for ConnectParams {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            auth: config.auth,
            viewer_port: config.viewer_port,
        }
    }
}

/// Lifecycle event emitted by the game client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// The bot entered the world
    Spawned,
    /// Connection-level error
    Error(String),
    /// The server removed the bot
    Kicked(String),
    /// The connection closed
    Ended(String),
}

/// Version-specific static game data (`mcData` in scripts)
#[derive(Debug, Clone, PartialEq)]
pub struct GameData {
    pub version: String,
    pub data: Value,
}

/// Screenshot parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRequest {
    pub width: u32,
    pub height: u32,
    /// Look direction relative to the bot's eye position
    pub direction: Vec3,
    /// View distance in chunks
    pub view_distance: u32,
}

impl Default for ScreenshotRequest {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            direction: Vec3::new(1.0, -0.2, 0.0),
            view_distance: 4,
        }
    }
}

/// Handle to a live game client
#[async_trait]
pub trait BotHandle: Send + Sync {
    /// Login name
    fn username(&self) -> &str;

    /// Game version, known once spawned
    async fn version(&self) -> Result<String>;

    /// Attach the movement capability with default movements
    async fn load_movement(&self) -> Result<()>;

    /// Load static data for the given version
    async fn load_game_data(&self, version: &str) -> Result<GameData>;

    /// Wait until the baseline world data around the bot is loaded
    async fn wait_for_world(&self) -> Result<()>;

    /// Read a client property (`bot.<path>`)
    async fn get(&self, path: &str) -> Result<Value>;

    /// Invoke a client method (`bot.<method>(...)`)
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value>;

    /// Set (or clear) the current movement goal
    async fn set_goal(&self, goal: Option<Goal>, dynamic: bool) -> Result<()>;

    /// Move until the goal is reached
    async fn goto(&self, goal: Goal) -> Result<()>;

    /// Stop the current movement goal
    async fn stop_goal(&self) -> Result<()>;

    async fn set_movements(&self, movements: MovementConfig) -> Result<()>;

    async fn is_moving(&self) -> Result<bool>;

    /// Render the bot's view as JPEG bytes
    async fn screenshot(&self, request: &ScreenshotRequest) -> Result<Vec<u8>>;

    /// Leave the server and release the client
    async fn quit(&self) -> Result<()>;
}

/// An opened (not yet spawned) connection
pub struct BotConnection {
    pub handle: Arc<dyn BotHandle>,
    pub events: mpsc::Receiver<BotEvent>,
}

impl std::fmt::Debug for BotConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConnection")
            .field("username", &self.handle.username())
            .finish()
    }
}

/// Opens game client connections
#[async_trait]
pub trait BotConnector: Send + Sync {
    /// Short backend name for logs and `status`
    fn name(&self) -> &'static str;

    async fn open(&self, params: &ConnectParams) -> Result<BotConnection>;
}
