//! # mcbot-foundation
//!
//! Foundation layer for mcbot:
//! - Error: 공통 에러 분류 (session, execution, task, input)
//! - Config: 통합 설정 (McbotConfig, JsonStore, 환경 변수 오버레이)
//!
//! ## 설정 우선순위
//!
//! ```text
//! defaults < ~/.config/mcbot/config.json < ./.mcbot/config.json
//!          < --config <file> < env vars < CLI flags
//! ```

pub mod config;
pub mod error;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    AuthMode, BackendConfig, BackendKind, ConnectionConfig, JsonStore, LimitsConfig,
    McbotConfig, ServerConfig, TransportKind, MCBOT_CONFIG_FILE,
};
