//! Transports
//!
//! - `stdio.rs` - newline-delimited JSON-RPC on stdin/stdout
//! - `http.rs` - stateless `POST /mcp`

pub mod http;
pub mod stdio;

pub use http::{router, serve_http};
pub use stdio::serve_stdio;
