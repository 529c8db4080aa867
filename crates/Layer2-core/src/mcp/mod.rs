//! MCP - Model Context Protocol 와이어 타입
//!
//! - `jsonrpc.rs` - JSON-RPC 2.0 요청/응답/에러
//! - `types.rs` - 명령 descriptor 및 응답 envelope
//!
//! ## 참고
//! - https://modelcontextprotocol.io/

mod jsonrpc;
mod types;

pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
pub use types::{CallToolResult, CommandCall, CommandDescriptor, Content};

/// 지원하는 MCP 프로토콜 버전
pub const PROTOCOL_VERSION: &str = "2024-11-05";
