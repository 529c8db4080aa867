//! Mcbot Config - 통합 설정
//!
//! 기본값 → 글로벌 → 프로젝트 → 명시적 파일 → 환경 변수 순으로 병합

use super::store::{load_file, JsonStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const MCBOT_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Mcbot Config (통합)
// ============================================================================

/// mcbot 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McbotConfig {
    /// 게임 서버 접속 기본값
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// 명령 서버 (MCP) 설정
    #[serde(default)]
    pub server: ServerConfig,

    /// 실행 제한
    #[serde(default)]
    pub limits: LimitsConfig,

    /// 게임 클라이언트 백엔드
    #[serde(default)]
    pub backend: BackendConfig,
}

impl McbotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 글로벌 + 프로젝트 + 명시적 파일 + 환경 변수 병합 로드
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<McbotConfig>(MCBOT_CONFIG_FILE)? {
                debug!("Loaded global config from {}", global.base_dir().display());
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<McbotConfig>(MCBOT_CONFIG_FILE)?
            {
                debug!("Loaded project config from {}", project.base_dir().display());
                config.merge(project_config);
            }
        }

        // 3. 명시적 파일 (없으면 에러)
        if let Some(path) = explicit {
            config.merge(load_file(path)?);
        }

        // 4. 환경 변수
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: McbotConfig) {
        self.connection.merge(other.connection);
        self.server.merge(other.server);
        self.limits.merge(other.limits);
        self.backend.merge(other.backend);
    }
}

// ============================================================================
// Connection Config
// ============================================================================

/// 인증 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// cracked / offline-mode 서버
    Offline,
    /// premium 계정
    #[default]
    Microsoft,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Offline => "offline",
            AuthMode::Microsoft => "microsoft",
        }
    }
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "offline" => Ok(AuthMode::Offline),
            "microsoft" => Ok(AuthMode::Microsoft),
            other => Err(Error::Config(format!(
                "Unknown auth mode '{}' (expected offline or microsoft)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 게임 서버 접속 기본값
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub auth: AuthMode,

    /// 브리지가 띄우는 웹 뷰어 포트
    #[serde(default = "default_viewer_port")]
    pub viewer_port: u16,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: None,
            auth: AuthMode::default(),
            viewer_port: default_viewer_port(),
        }
    }
}

impl ConnectionConfig {
    fn merge(&mut self, other: ConnectionConfig) {
        if other.host != default_host() {
            self.host = other.host;
        }
        if other.port != default_port() {
            self.port = other.port;
        }
        if other.username != default_username() {
            self.username = other.username;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.auth != AuthMode::default() {
            self.auth = other.auth;
        }
        if other.viewer_port != default_viewer_port() {
            self.viewer_port = other.viewer_port;
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// 명령 서버 전송 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Stdio,
    Http,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            other => Err(Error::Config(format!(
                "Unknown transport '{}' (expected stdio or http)",
                other
            ))),
        }
    }
}

/// 명령 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            http_port: default_http_port(),
        }
    }
}

impl ServerConfig {
    fn merge(&mut self, other: ServerConfig) {
        if other.transport != TransportKind::default() {
            self.transport = other.transport;
        }
        if other.http_port != default_http_port() {
            self.http_port = other.http_port;
        }
    }
}

// ============================================================================
// Limits Config
// ============================================================================

/// 실행 제한 (초 단위)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// 동기 eval 타임아웃
    #[serde(default = "default_eval_timeout")]
    pub eval_timeout_secs: u64,

    /// 접속 시도 타임아웃
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// spawn 이후 청크 로딩 대기 (grace period)
    #[serde(default = "default_world_wait")]
    pub world_wait_secs: u64,

    /// 스크립트 한 번 실행의 최대 step 수
    #[serde(default = "default_step_budget")]
    pub step_budget: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            eval_timeout_secs: default_eval_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            world_wait_secs: default_world_wait(),
            step_budget: default_step_budget(),
        }
    }
}

impl LimitsConfig {
    fn merge(&mut self, other: LimitsConfig) {
        if other.eval_timeout_secs != default_eval_timeout() {
            self.eval_timeout_secs = other.eval_timeout_secs;
        }
        if other.connect_timeout_secs != default_connect_timeout() {
            self.connect_timeout_secs = other.connect_timeout_secs;
        }
        if other.world_wait_secs != default_world_wait() {
            self.world_wait_secs = other.world_wait_secs;
        }
        if other.step_budget != default_step_budget() {
            self.step_budget = other.step_budget;
        }
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn world_wait(&self) -> Duration {
        Duration::from_secs(self.world_wait_secs)
    }
}

// ============================================================================
// Backend Config
// ============================================================================

/// 게임 클라이언트 백엔드 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 외부 브리지 프로세스 (stdio JSON-RPC)
    #[default]
    Bridge,
    /// 메모리 내 시뮬레이션
    Simulated,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bridge" => Ok(BackendKind::Bridge),
            "simulated" | "sim" => Ok(BackendKind::Simulated),
            other => Err(Error::Config(format!(
                "Unknown backend '{}' (expected bridge or simulated)",
                other
            ))),
        }
    }
}

/// 게임 클라이언트 백엔드 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// 브리지 실행 명령어
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl BackendConfig {
    fn merge(&mut self, other: BackendConfig) {
        if other.kind != BackendKind::default() {
            self.kind = other.kind;
        }
        if other.command.is_some() {
            self.command = other.command;
        }
        if !other.args.is_empty() {
            self.args = other.args;
        }
        self.env.extend(other.env);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    25565
}

fn default_username() -> String {
    "mcp-bot".to_string()
}

fn default_viewer_port() -> u16 {
    3000
}

fn default_http_port() -> u16 {
    3001
}

fn default_eval_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_world_wait() -> u64 {
    10
}

fn default_step_budget() -> u64 {
    50_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = McbotConfig::new();
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 25565);
        assert_eq!(config.connection.username, "mcp-bot");
        assert_eq!(config.connection.auth, AuthMode::Microsoft);
        assert_eq!(config.server.transport, TransportKind::Stdio);
        assert_eq!(config.server.http_port, 3001);
        assert_eq!(config.limits.eval_timeout(), Duration::from_secs(30));
        assert_eq!(config.backend.kind, BackendKind::Bridge);
    }

    #[test]
    fn test_partial_json() {
        let config: McbotConfig = serde_json::from_str(
            r#"{"connection": {"host": "mc.example.org", "auth": "offline"}, "limits": {"evalTimeoutSecs": 5}}"#,
        )
        .unwrap();

        assert_eq!(config.connection.host, "mc.example.org");
        assert_eq!(config.connection.port, 25565);
        assert_eq!(config.connection.auth, AuthMode::Offline);
        assert_eq!(config.limits.eval_timeout_secs, 5);
        assert_eq!(config.limits.connect_timeout_secs, 30);
    }

    #[test]
    fn test_config_merge() {
        let mut base = McbotConfig::new();
        base.connection.host = "lan-server".to_string();
        base.backend.command = Some("node".to_string());

        let mut overlay = McbotConfig::new();
        overlay.connection.port = 25566;
        overlay.backend.kind = BackendKind::Simulated;

        base.merge(overlay);

        assert_eq!(base.connection.host, "lan-server");
        assert_eq!(base.connection.port, 25566);
        assert_eq!(base.backend.kind, BackendKind::Simulated);
        assert_eq!(base.backend.command.as_deref(), Some("node"));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("OFFLINE".parse::<AuthMode>().unwrap(), AuthMode::Offline);
        assert_eq!("http".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert_eq!("sim".parse::<BackendKind>().unwrap(), BackendKind::Simulated);
        assert!("ldap".parse::<AuthMode>().is_err());
    }
}
