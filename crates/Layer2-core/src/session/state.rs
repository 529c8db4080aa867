//! Session state

use super::client::{BotHandle, ConnectParams, GameData};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// 세션 라이프사이클 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// 연결 없음
    Idle,
    /// 핸드셰이크 / 초기화 중
    Connecting,
    /// 명령 실행 가능
    Ready,
    /// 연결 또는 초기화 실패
    Failed,
}

impl SessionState {
    /// connect가 거부되는 상태인지
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub params: Option<ConnectParams>,
    pub version: Option<String>,
    pub since: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub(crate) fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            params: None,
            version: None,
            since: Utc::now(),
            last_error: None,
        }
    }
}

/// A Ready session: everything a command or a script needs
#[derive(Clone)]
pub struct ReadySession {
    pub handle: Arc<dyn BotHandle>,
    pub game_data: Arc<GameData>,
    pub params: ConnectParams,
    pub version: String,
}

impl std::fmt::Debug for ReadySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadySession")
            .field("params", &self.params)
            .field("version", &self.version)
            .finish()
    }
}

/// What the actor publishes on its watch channel
#[derive(Debug, Clone)]
pub(crate) struct SessionView {
    pub snapshot: SessionSnapshot,
    pub ready: Option<ReadySession>,
}

/// Result of a disconnect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Disconnected,
    /// Nothing to disconnect
    NotConnected,
}
