//! mcbot-server: MCP command server
//!
//! Layer3 - 명령 서버 레이어
//!
//! # 주요 모듈
//!
//! - `commands`: 명령 카탈로그 (connect, eval, get_task, ...)
//! - `dispatcher`: 명령 실행 + uniform envelope 변환 (panic 포함)
//! - `protocol`: MCP JSON-RPC 메서드 처리
//! - `transport`: stdio / HTTP 전송
//!
//! # 사용 예시
//!
//! ```ignore
//! let ctx = CommandContext::new(sessions, tasks, config.connection.clone());
//! let server = McpServer::new(Dispatcher::with_builtins(ctx));
//! serve_stdio(server).await?;
//! ```

pub mod commands;
pub mod dispatcher;
pub mod protocol;
pub mod transport;

pub use commands::{Command, CommandContext, CommandDef};
pub use dispatcher::{render_error, Dispatcher};
pub use protocol::{McpServer, SERVER_NAME};
pub use transport::{router, serve_http, serve_stdio};
