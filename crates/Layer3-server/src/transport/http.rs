//! HTTP transport - stateless MCP over `POST /mcp`
//!
//! Every request is handled independently against the same in-process
//! session and task state. Notifications are acknowledged with `202`.

use crate::protocol::McpServer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mcbot_foundation::Result;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{debug, info};

/// Router exposing `/mcp`
pub fn router(server: McpServer) -> Router {
    Router::new()
        .route(
            "/mcp",
            post(handle_post).get(not_allowed).delete(not_allowed),
        )
        .with_state(server)
}

/// Bind `0.0.0.0:port` and serve until the listener fails
pub async fn serve_http(server: McpServer, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP MCP server listening");

    axum::serve(listener, router(server)).await?;
    Ok(())
}

async fn handle_post(State(server): State<McpServer>, body: String) -> Response {
    debug!(bytes = body.len(), "POST /mcp");
    match server.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed in stateless mode" })),
    )
        .into_response()
}
