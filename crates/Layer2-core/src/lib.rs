//! mcbot-core: Core Runtime for mcbot
//!
//! Layer2 - 세션 및 게임 클라이언트 레이어
//!
//! # 주요 모듈
//!
//! - `session`: 단일 세션 라이프사이클 (actor 기반 SessionManager)
//! - `bridge`: 외부 브리지 프로세스 기반 게임 클라이언트
//! - `mcp`: MCP (JSON-RPC 2.0) 와이어 타입 및 응답 envelope
//!
//! # 사용 예시
//!
//! ```ignore
//! use mcbot_core::session::{SessionLimits, SessionManager};
//! use mcbot_core::bridge::BridgeConnector;
//!
//! let connector = Arc::new(BridgeConnector::from_config(&config.backend));
//! let sessions = SessionManager::spawn(connector, SessionLimits::from(&config.limits));
//!
//! let ready = sessions.connect(ConnectParams::from(&config.connection)).await?;
//! println!("version {}", ready.version);
//! ```

pub mod bridge;
pub mod mcp;
pub mod session;

// Re-exports: Session
pub use session::{
    BotConnector, BotHandle, ConnectParams, DisconnectOutcome, ReadySession, SessionLimits,
    SessionManager, SessionSnapshot, SessionState,
};

// Re-exports: MCP
pub use mcp::{CallToolResult, CommandDescriptor, Content};
