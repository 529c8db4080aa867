//! Bridge - 외부 게임 클라이언트 프로세스 연동
//!
//! - `transport.rs` - stdio JSON-RPC (요청/응답 + 알림)
//! - `connector.rs` - BotConnector / BotHandle 구현
//!
//! ## 프로토콜
//! - 요청: `bot/connect`, `bot/get`, `bot/call`, `pathfinder/*`, `data/load`,
//!   `world/waitForChunks`, `render/screenshot`, `bot/quit`
//! - 알림: `bot/spawn`, `bot/error`, `bot/kicked`, `bot/end`

mod connector;
mod transport;

pub use connector::{BridgeBot, BridgeConnector, DEFAULT_BRIDGE_COMMAND};
pub use transport::{BridgeTransport, BRIDGE_APP_ERROR, DEFAULT_REQUEST_TIMEOUT};
