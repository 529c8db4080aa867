//! Simulated game client
//!
//! An in-memory bot used by tests and offline dry runs. It keeps a tiny
//! world model (position, chat log, movement goal) and can be told to fail
//! at each stage of the connection lifecycle.

use super::client::{
    BotConnection, BotConnector, BotEvent, BotHandle, ConnectParams, GameData, ScreenshotRequest,
};
use super::goal::{Goal, MovementConfig, Vec3};
use async_trait::async_trait;
use mcbot_foundation::{Error, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Failure modes and timings of the simulated backend
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub version: String,
    /// Delay between open and the spawn (or kick) event
    pub spawn_delay: Duration,
    /// Emit a connection error instead of spawning
    pub connect_error: Option<String>,
    /// Kick the bot instead of spawning
    pub kick_reason: Option<String>,
    /// Fail post-spawn initialization
    pub fail_init: bool,
    /// `wait_for_world` never finishes
    pub world_never_loads: bool,
    /// How long a `goto` takes
    pub travel_time: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            version: "1.20.4".to_string(),
            spawn_delay: Duration::from_millis(10),
            connect_error: None,
            kick_reason: None,
            fail_init: false,
            world_never_loads: false,
            travel_time: Duration::ZERO,
        }
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens [`SimulatedBot`]s
#[derive(Default)]
pub struct SimulatedConnector {
    options: SimOptions,
    last: Mutex<Option<Arc<SimulatedBot>>>,
    opened: AtomicUsize,
}

impl SimulatedConnector {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            last: Mutex::new(None),
            opened: AtomicUsize::new(0),
        }
    }

    /// Most recently opened bot
    pub fn last_bot(&self) -> Option<Arc<SimulatedBot>> {
        self.last.lock().clone()
    }

    /// Number of connections opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BotConnector for SimulatedConnector {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn open(&self, params: &ConnectParams) -> Result<BotConnection> {
        let (events_tx, events) = mpsc::channel(16);
        let bot = Arc::new(SimulatedBot::new(
            params.username.clone(),
            self.options.clone(),
            events_tx.clone(),
        ));

        *self.last.lock() = Some(Arc::clone(&bot));
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!("Simulated bot opened for {}:{}", params.host, params.port);

        let options = self.options.clone();
        tokio::spawn(async move {
            tokio::time::sleep(options.spawn_delay).await;
            let event = if let Some(message) = options.connect_error {
                BotEvent::Error(message)
            } else if let Some(reason) = options.kick_reason {
                BotEvent::Kicked(reason)
            } else {
                BotEvent::Spawned
            };
            let _ = events_tx.send(event).await;
        });

        Ok(BotConnection {
            handle: bot,
            events,
        })
    }
}

// ============================================================================
// Bot
// ============================================================================

#[derive(Debug)]
struct World {
    position: Vec3,
    yaw: f64,
    pitch: f64,
    health: f64,
    food: f64,
    chat: Vec<String>,
    goal: Option<Goal>,
    movements: Option<MovementConfig>,
    moving: bool,
}

/// In-memory bot
pub struct SimulatedBot {
    username: String,
    options: SimOptions,
    events: mpsc::Sender<BotEvent>,
    world: Mutex<World>,
    quit: AtomicBool,
}

impl SimulatedBot {
    fn new(username: String, options: SimOptions, events: mpsc::Sender<BotEvent>) -> Self {
        Self {
            username,
            options,
            events,
            world: Mutex::new(World {
                position: Vec3::new(0.5, 64.0, 0.5),
                yaw: 0.0,
                pitch: 0.0,
                health: 20.0,
                food: 20.0,
                chat: Vec::new(),
                goal: None,
                movements: None,
                moving: false,
            }),
            quit: AtomicBool::new(false),
        }
    }

    /// Server-side kick
    pub async fn kick(&self, reason: &str) {
        let _ = self.events.send(BotEvent::Kicked(reason.to_string())).await;
    }

    /// Messages sent through `bot.chat`
    pub fn chat_log(&self) -> Vec<String> {
        self.world.lock().chat.clone()
    }

    pub fn position(&self) -> Vec3 {
        self.world.lock().position
    }

    pub fn goal(&self) -> Option<Goal> {
        self.world.lock().goal.clone()
    }

    pub fn movements(&self) -> Option<MovementConfig> {
        self.world.lock().movements.clone()
    }

    pub fn has_quit(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.has_quit() {
            return Err(Error::Connection("Simulated bot has quit".to_string()));
        }
        Ok(())
    }

    fn entity(world: &World) -> Value {
        json!({
            "position": world.position,
            "yaw": world.yaw,
            "pitch": world.pitch,
            "onGround": true,
            "height": 1.8,
        })
    }
}

#[async_trait]
impl BotHandle for SimulatedBot {
    fn username(&self) -> &str {
        &self.username
    }

    async fn version(&self) -> Result<String> {
        Ok(self.options.version.clone())
    }

    async fn load_movement(&self) -> Result<()> {
        if self.options.fail_init {
            return Err(Error::Internal("Movement plugin failed to load".to_string()));
        }
        self.world.lock().movements = Some(MovementConfig::default());
        Ok(())
    }

    async fn load_game_data(&self, version: &str) -> Result<GameData> {
        Ok(GameData {
            version: version.to_string(),
            data: json!({
                "version": { "minecraftVersion": version },
                "blocksByName": {
                    "stone": { "id": 1, "name": "stone", "hardness": 1.5 },
                    "oak_log": { "id": 46, "name": "oak_log", "hardness": 2.0 },
                },
                "itemsByName": {
                    "diamond": { "id": 802, "name": "diamond", "stackSize": 64 },
                    "stick": { "id": 848, "name": "stick", "stackSize": 64 },
                },
            }),
        })
    }

    async fn wait_for_world(&self) -> Result<()> {
        if self.options.world_never_loads {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.ensure_online()?;
        let world = self.world.lock();
        Ok(match path {
            "username" => json!(self.username),
            "version" => json!(self.options.version),
            "health" => json!(world.health),
            "food" => json!(world.food),
            "entity" => Self::entity(&world),
            "players" => json!({ self.username.clone(): { "username": self.username } }),
            "chatLog" => json!(world.chat),
            "game" => json!({ "dimension": "overworld", "gameMode": "survival" }),
            "time" => json!({ "timeOfDay": 6000, "isDay": true }),
            _ => Value::Null,
        })
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.ensure_online()?;
        match method {
            "chat" | "whisper" => {
                let text = args
                    .last()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .unwrap_or_default();
                self.world.lock().chat.push(text);
                Ok(Value::Null)
            }
            "look" => {
                let mut world = self.world.lock();
                world.yaw = args.first().and_then(Value::as_f64).unwrap_or(world.yaw);
                world.pitch = args.get(1).and_then(Value::as_f64).unwrap_or(world.pitch);
                Ok(Value::Null)
            }
            "lookAt" | "setControlState" | "clearControlStates" | "swingArm" => Ok(Value::Null),
            "blockAt" => {
                let position = args.first().and_then(Vec3::from_value);
                Ok(match position {
                    Some(p) if p.y < 64.0 => json!({ "name": "stone", "position": p.floored() }),
                    Some(p) => json!({ "name": "air", "position": p.floored() }),
                    None => Value::Null,
                })
            }
            _ => Err(Error::execution(
                format!("bot.{} is not a function", method),
                String::new(),
            )),
        }
    }

    async fn set_goal(&self, goal: Option<Goal>, _dynamic: bool) -> Result<()> {
        self.ensure_online()?;
        let mut world = self.world.lock();
        world.moving = goal.is_some();
        world.goal = goal;
        Ok(())
    }

    async fn goto(&self, goal: Goal) -> Result<()> {
        self.ensure_online()?;
        {
            let mut world = self.world.lock();
            world.goal = Some(goal.clone());
            world.moving = true;
        }

        if !self.options.travel_time.is_zero() {
            tokio::time::sleep(self.options.travel_time).await;
        }

        let mut world = self.world.lock();
        if world.goal.as_ref() != Some(&goal) {
            // replaced or stopped while travelling
            return Err(Error::execution("Goal was changed before it could be completed!", ""));
        }
        if let Some(target) = goal.target() {
            world.position = target;
        }
        world.goal = None;
        world.moving = false;
        Ok(())
    }

    async fn stop_goal(&self) -> Result<()> {
        let mut world = self.world.lock();
        world.goal = None;
        world.moving = false;
        Ok(())
    }

    async fn set_movements(&self, movements: MovementConfig) -> Result<()> {
        self.ensure_online()?;
        self.world.lock().movements = Some(movements);
        Ok(())
    }

    async fn is_moving(&self) -> Result<bool> {
        Ok(self.world.lock().moving)
    }

    async fn screenshot(&self, request: &ScreenshotRequest) -> Result<Vec<u8>> {
        self.ensure_online()?;
        // Minimal JPEG frame: SOI, a comment segment carrying the size, EOI
        let comment = format!("{}x{}", request.width, request.height);
        let len = (comment.len() + 2) as u16;
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xFE];
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(comment.as_bytes());
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        Ok(bytes)
    }

    async fn quit(&self) -> Result<()> {
        if !self.quit.swap(true, Ordering::SeqCst) {
            let _ = self.events.try_send(BotEvent::Ended("quit".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcbot_foundation::AuthMode;

    fn params() -> ConnectParams {
        ConnectParams {
            host: "localhost".to_string(),
            port: 25565,
            username: "sim".to_string(),
            password: None,
            auth: AuthMode::Offline,
            viewer_port: 3000,
        }
    }

    #[tokio::test]
    async fn test_spawn_event() {
        let connector = SimulatedConnector::new(SimOptions::default());
        let mut connection = connector.open(&params()).await.unwrap();
        assert_eq!(connection.events.recv().await, Some(BotEvent::Spawned));
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_goto_moves_bot() {
        let connector = SimulatedConnector::new(SimOptions::default());
        let connection = connector.open(&params()).await.unwrap();
        let bot = connector.last_bot().unwrap();

        connection
            .handle
            .goto(Goal::GoalBlock {
                x: 10.0,
                y: 64.0,
                z: 3.0,
            })
            .await
            .unwrap();
        assert_eq!(bot.position(), Vec3::new(10.0, 64.0, 3.0));
        assert!(!connection.handle.is_moving().await.unwrap());
    }

    #[tokio::test]
    async fn test_chat_and_unknown_method() {
        let connector = SimulatedConnector::new(SimOptions::default());
        let connection = connector.open(&params()).await.unwrap();

        connection.handle.call("chat", vec![json!("hello")]).await.unwrap();
        assert_eq!(connector.last_bot().unwrap().chat_log(), vec!["hello"]);

        let err = connection.handle.call("fly", vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "bot.fly is not a function");
    }

    #[tokio::test]
    async fn test_quit_blocks_further_calls() {
        let connector = SimulatedConnector::new(SimOptions::default());
        let connection = connector.open(&params()).await.unwrap();
        connection.handle.quit().await.unwrap();
        assert!(connection.handle.get("health").await.is_err());
    }
}
