//! Config - 통합 설정 관리
//!
//! - `mcbot.rs` - McbotConfig 통합 설정 (connection, server, limits, backend)
//! - `store.rs` - JSON 설정 파일 저장소 (global / project)
//! - `env.rs` - 환경 변수 오버레이

mod env;
mod mcbot;
mod store;

pub use mcbot::{
    AuthMode, BackendConfig, BackendKind, ConnectionConfig, LimitsConfig, McbotConfig,
    ServerConfig, TransportKind, MCBOT_CONFIG_FILE,
};
pub use store::JsonStore;
