//! Session - 단일 게임 세션 라이프사이클
//!
//! - `client.rs` - 게임 클라이언트 협력자 trait (BotConnector, BotHandle, BotEvent)
//! - `goal.rs` - 이동 goal, movement 설정, Vec3
//! - `state.rs` - SessionState / SessionSnapshot
//! - `manager.rs` - actor 기반 SessionManager
//! - `sim.rs` - 메모리 내 시뮬레이션 백엔드
//!
//! ```text
//! Idle/Failed  --connect-->        Connecting
//! Connecting   --init ok-->        Ready
//! Connecting   --error/init err--> Failed
//! Ready        --error-->          Failed
//! any          --kicked/ended-->   Idle
//! any          --disconnect-->     Idle
//! ```

mod client;
mod goal;
mod manager;
pub mod sim;
mod state;

pub use client::{
    BotConnection, BotConnector, BotEvent, BotHandle, ConnectParams, GameData, ScreenshotRequest,
};
pub use goal::{Goal, MovementConfig, Vec3};
pub use manager::{SessionLimits, SessionManager};
pub use state::{DisconnectOutcome, ReadySession, SessionSnapshot, SessionState};
