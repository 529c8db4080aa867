//! Session Manager
//!
//! A single actor task owns the session. Callers talk to it through an
//! `mpsc` command channel with `oneshot` replies; the connection driver feeds
//! lifecycle events into the same channel, tagged with the connection
//! generation that produced them. A `watch` channel publishes the current
//! view so `is_ready()` / `handle()` never wait on the actor.

use super::client::{BotConnector, BotEvent, BotHandle, ConnectParams, GameData};
use super::state::{DisconnectOutcome, ReadySession, SessionSnapshot, SessionState, SessionView};
use chrono::Utc;
use mcbot_foundation::{Error, LimitsConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// quit 응답 대기 한도
const QUIT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Limits
// ============================================================================

/// Session timing limits
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// 접속 요청 타임아웃
    pub connect_timeout: Duration,
    /// spawn 이후 월드 로딩 grace period
    pub world_wait: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            world_wait: Duration::from_secs(10),
        }
    }
}

impl From<&LimitsConfig> for SessionLimits {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            connect_timeout: limits.connect_timeout(),
            world_wait: limits.world_wait(),
        }
    }
}

// ============================================================================
// Actor messages
// ============================================================================

enum Command {
    Connect {
        params: ConnectParams,
        reply: oneshot::Sender<Result<ReadySession>>,
    },
    Disconnect {
        reply: oneshot::Sender<DisconnectOutcome>,
    },
    Driver {
        generation: u64,
        event: DriverEvent,
    },
}

enum DriverEvent {
    Opened(Arc<dyn BotHandle>),
    OpenFailed(Error),
    Initialized(Result<(String, GameData)>),
    Lifecycle(BotEvent),
}

// ============================================================================
// Public handle
// ============================================================================

/// Cloneable handle to the session actor
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    limits: SessionLimits,
    backend: &'static str,
}

impl SessionManager {
    /// Start the actor on the current runtime
    pub fn spawn(connector: Arc<dyn BotConnector>, limits: SessionLimits) -> Self {
        let (commands, rx) = mpsc::channel(64);
        let (view_tx, view) = watch::channel(SessionView {
            snapshot: SessionSnapshot::idle(),
            ready: None,
        });
        let backend = connector.name();

        let actor = SessionActor {
            connector,
            limits,
            commands: commands.downgrade(),
            view: view_tx,
            generation: 0,
            state: SessionState::Idle,
            params: None,
            handle: None,
            game_data: None,
            version: None,
            last_error: None,
            pending: None,
            driver: None,
        };
        tokio::spawn(actor.run(rx));

        Self {
            commands,
            view,
            limits,
            backend,
        }
    }

    /// Connect and wait until the bot is Ready, the attempt fails, or the
    /// connect timeout elapses. On timeout the handshake keeps going in the
    /// background; its outcome shows up in `snapshot()`.
    pub async fn connect(&self, params: ConnectParams) -> Result<ReadySession> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect { params, reply }).await?;

        match tokio::time::timeout(self.limits.connect_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(actor_gone()),
            Err(_) => {
                warn!(
                    "Connection attempt still pending after {}s",
                    self.limits.connect_timeout.as_secs()
                );
                Err(Error::ConnectionTimeout(self.limits.connect_timeout))
            }
        }
    }

    pub async fn disconnect(&self) -> Result<DisconnectOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Disconnect { reply }).await?;
        rx.await.map_err(|_| actor_gone())
    }

    pub fn is_ready(&self) -> bool {
        self.view.borrow().snapshot.state == SessionState::Ready
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.view.borrow().snapshot.clone()
    }

    /// The live session, only while Ready
    pub fn handle(&self) -> Option<ReadySession> {
        self.view.borrow().ready.clone()
    }

    /// The live session or `NotConnected`
    pub fn require_ready(&self) -> Result<ReadySession> {
        self.handle().ok_or(Error::NotConnected)
    }

    /// Best-effort stop of the current movement goal
    pub async fn stop_activity(&self) {
        if let Some(session) = self.handle() {
            if let Err(e) = session.handle.stop_goal().await {
                debug!("Ignoring stop_goal failure: {}", e);
            }
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Backend name of the connector
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| actor_gone())
    }
}

fn actor_gone() -> Error {
    Error::Internal("Session manager stopped".to_string())
}

// ============================================================================
// Actor
// ============================================================================

struct SessionActor {
    connector: Arc<dyn BotConnector>,
    limits: SessionLimits,
    /// Weak so the actor stops once every public handle is dropped
    commands: mpsc::WeakSender<Command>,
    view: watch::Sender<SessionView>,

    generation: u64,
    state: SessionState,
    params: Option<ConnectParams>,
    handle: Option<Arc<dyn BotHandle>>,
    game_data: Option<Arc<GameData>>,
    version: Option<String>,
    last_error: Option<String>,
    pending: Option<oneshot::Sender<Result<ReadySession>>>,
    driver: Option<JoinHandle<()>>,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Connect { params, reply } => self.on_connect(params, reply),
                Command::Disconnect { reply } => {
                    let outcome = self.on_disconnect().await;
                    let _ = reply.send(outcome);
                }
                Command::Driver { generation, event } => {
                    if generation != self.generation {
                        debug!(
                            "Ignoring event from stale connection (generation {} != {})",
                            generation, self.generation
                        );
                        // 핸드셰이크 도중 disconnect 된 연결도 quit 시킴
                        if let DriverEvent::Opened(handle) = event {
                            release(handle);
                        }
                        continue;
                    }
                    self.on_driver_event(event);
                }
            }
        }

        // 모든 핸들이 drop됨
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(QUIT_TIMEOUT, handle.quit()).await;
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        debug!("Session actor finished");
    }

    fn on_connect(&mut self, params: ConnectParams, reply: oneshot::Sender<Result<ReadySession>>) {
        if self.state.is_active() {
            let _ = reply.send(Err(Error::AlreadyConnected));
            return;
        }

        let Some(commands) = self.commands.upgrade() else {
            let _ = reply.send(Err(actor_gone()));
            return;
        };

        self.generation += 1;
        info!(
            "Connecting to {}:{} as {} (backend: {})",
            params.host,
            params.port,
            params.username,
            self.connector.name()
        );

        self.params = Some(params.clone());
        self.version = None;
        self.game_data = None;
        self.last_error = None;
        self.pending = Some(reply);
        self.driver = Some(tokio::spawn(drive(
            Arc::clone(&self.connector),
            params,
            self.limits.world_wait,
            self.generation,
            commands,
        )));
        self.transition(SessionState::Connecting);
    }

    async fn on_disconnect(&mut self) -> DisconnectOutcome {
        if self.state == SessionState::Idle {
            return DisconnectOutcome::NotConnected;
        }

        if let Some(handle) = self.handle.take() {
            match tokio::time::timeout(QUIT_TIMEOUT, handle.quit()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error while quitting: {}", e),
                Err(_) => warn!("Quit did not finish within {}s", QUIT_TIMEOUT.as_secs()),
            }
        }

        self.retire_connection();
        self.fail_pending(Error::Connection(
            "Disconnected before the bot was ready".to_string(),
        ));
        self.game_data = None;
        self.transition(SessionState::Idle);
        info!("Disconnected from server");
        DisconnectOutcome::Disconnected
    }

    fn on_driver_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Opened(handle) => {
                if self.state == SessionState::Connecting {
                    self.handle = Some(handle);
                    self.publish();
                } else {
                    release(handle);
                }
            }
            DriverEvent::OpenFailed(e) => {
                warn!("Failed to open connection: {}", e);
                self.fail(e.to_string(), e);
            }
            DriverEvent::Initialized(Ok((version, game_data))) => {
                let (Some(handle), Some(params)) = (self.handle.clone(), self.params.clone())
                else {
                    return;
                };
                if self.state != SessionState::Connecting {
                    return;
                }

                let game_data = Arc::new(game_data);
                self.version = Some(version.clone());
                self.game_data = Some(Arc::clone(&game_data));
                self.transition(SessionState::Ready);
                info!("Bot is ready (version {})", version);

                if let Some(pending) = self.pending.take() {
                    let _ = pending.send(Ok(ReadySession {
                        handle,
                        game_data,
                        params,
                        version,
                    }));
                }
            }
            DriverEvent::Initialized(Err(e)) => {
                let detail = format!("Spawn/initialization error: {}", e);
                warn!("{}", detail);
                self.fail(detail.clone(), Error::Connection(detail));
            }
            DriverEvent::Lifecycle(BotEvent::Spawned) => {}
            DriverEvent::Lifecycle(BotEvent::Error(message)) => {
                warn!("Connection error: {}", message);
                self.fail(message.clone(), Error::Connection(message));
            }
            DriverEvent::Lifecycle(BotEvent::Kicked(reason)) => {
                info!("Bot kicked: {}", reason);
                self.end(Error::Connection(format!("Kicked from server: {}", reason)));
            }
            DriverEvent::Lifecycle(BotEvent::Ended(reason)) => {
                info!("Bot disconnected: {}", reason);
                self.end(Error::Connection(format!("Connection ended: {}", reason)));
            }
        }
    }

    /// → Failed, handle cleared
    fn fail(&mut self, detail: String, error: Error) {
        if let Some(handle) = self.handle.take() {
            release(handle);
        }
        self.retire_connection();
        self.last_error = Some(detail);
        self.game_data = None;
        self.fail_pending(error);
        self.transition(SessionState::Failed);
    }

    /// → Idle, handle cleared (kicked / ended)
    fn end(&mut self, error: Error) {
        if let Some(handle) = self.handle.take() {
            release(handle);
        }
        self.retire_connection();
        self.game_data = None;
        self.fail_pending(error);
        self.transition(SessionState::Idle);
    }

    /// Invalidate the current generation so late driver events are dropped
    fn retire_connection(&mut self) {
        self.generation += 1;
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }

    fn fail_pending(&mut self, error: Error) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.send(Err(error));
        }
    }

    fn transition(&mut self, state: SessionState) {
        debug!("Session state: {} -> {}", self.state, state);
        self.state = state;
        // failure detail lives only as long as Failed
        if state != SessionState::Failed {
            self.last_error = None;
        }
        self.publish_at(Utc::now());
    }

    fn publish(&mut self) {
        let since = self.view.borrow().snapshot.since;
        self.publish_at(since);
    }

    fn publish_at(&mut self, since: chrono::DateTime<Utc>) {
        let ready = match (&self.state, &self.handle, &self.game_data, &self.params, &self.version) {
            (SessionState::Ready, Some(handle), Some(game_data), Some(params), Some(version)) => {
                Some(ReadySession {
                    handle: Arc::clone(handle),
                    game_data: Arc::clone(game_data),
                    params: params.clone(),
                    version: version.clone(),
                })
            }
            _ => None,
        };

        let snapshot = SessionSnapshot {
            state: self.state,
            params: self.params.clone(),
            version: self.version.clone(),
            since,
            last_error: self.last_error.clone(),
        };
        self.view.send_replace(SessionView { snapshot, ready });
    }
}

/// Quit a handle that is no longer part of the session, in the background
fn release(handle: Arc<dyn BotHandle>) {
    tokio::spawn(async move {
        match tokio::time::timeout(QUIT_TIMEOUT, handle.quit()).await {
            Ok(Err(e)) => debug!("Ignoring quit failure on released handle: {}", e),
            Err(_) => debug!("Released handle did not quit in time"),
            Ok(Ok(())) => {}
        }
    });
}

// ============================================================================
// Connection driver
// ============================================================================

/// Open the connection, then pump its events into the actor. The first
/// spawn runs post-connect initialization; later spawns (respawns) are
/// ignored.
async fn drive(
    connector: Arc<dyn BotConnector>,
    params: ConnectParams,
    world_wait: Duration,
    generation: u64,
    commands: mpsc::Sender<Command>,
) {
    let send = |event: DriverEvent| {
        let commands = commands.clone();
        async move {
            let _ = commands.send(Command::Driver { generation, event }).await;
        }
    };

    let connection = match connector.open(&params).await {
        Ok(connection) => connection,
        Err(e) => {
            send(DriverEvent::OpenFailed(e)).await;
            return;
        }
    };

    let handle = connection.handle;
    let mut events = connection.events;
    send(DriverEvent::Opened(Arc::clone(&handle))).await;

    let mut initialized = false;
    while let Some(event) = events.recv().await {
        match event {
            BotEvent::Spawned if !initialized => {
                initialized = true;
                let result = initialize(handle.as_ref(), world_wait).await;
                send(DriverEvent::Initialized(result)).await;
            }
            BotEvent::Spawned => debug!("Bot respawned"),
            other => send(DriverEvent::Lifecycle(other)).await,
        }
    }

    send(DriverEvent::Lifecycle(BotEvent::Ended(
        "event stream closed".to_string(),
    )))
    .await;
}

/// Post-connect initialization: movement, static data, baseline world
async fn initialize(handle: &dyn BotHandle, world_wait: Duration) -> Result<(String, GameData)> {
    info!("Bot spawned, loading movement capability...");
    handle.load_movement().await?;

    let version = handle.version().await?;
    let game_data = handle.load_game_data(&version).await?;
    info!("Loaded game data for version {}", version);

    debug!("Waiting for world data (max {}s)...", world_wait.as_secs());
    match tokio::time::timeout(world_wait, handle.wait_for_world()).await {
        Ok(Ok(())) => debug!("World data loaded"),
        Ok(Err(e)) => warn!("World wait failed, proceeding: {}", e),
        Err(_) => debug!("Proceeding (world may still be loading)"),
    }

    Ok((version, game_data))
}
