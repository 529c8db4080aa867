//! status / screenshot - read-only queries

use super::{parse_args, Command, CommandContext, CommandDef};
use async_trait::async_trait;
use base64::Engine;
use mcbot_core::mcp::{CallToolResult, CommandDescriptor};
use mcbot_core::session::{ScreenshotRequest, Vec3};
use mcbot_foundation::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// status
// ============================================================================

pub struct StatusCommand;

#[async_trait]
impl Command for StatusCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder(
            "status",
            "Show the connection state, server, game version and background task counts",
        )
        .build()
    }

    async fn execute(&self, ctx: &CommandContext, _args: Value) -> Result<CallToolResult> {
        let snapshot = ctx.session.snapshot();
        let counts = ctx.tasks.counts();

        let mut lines = vec![
            format!("Session: {}", snapshot.state),
            format!("Backend: {}", ctx.session.backend()),
        ];
        if let Some(params) = &snapshot.params {
            lines.push(format!(
                "Server: {}:{} as {} ({})",
                params.host, params.port, params.username, params.auth
            ));
            lines.push(format!("Viewer port: {}", params.viewer_port));
        }
        if let Some(version) = &snapshot.version {
            lines.push(format!("Version: {}", version));
        }
        lines.push(format!("Since: {}", snapshot.since.to_rfc3339()));
        if let Some(error) = &snapshot.last_error {
            lines.push(format!("Last error: {}", error));
        }
        lines.push(format!(
            "Tasks: {} total ({} running, {} completed, {} error, {} cancelled)",
            counts.total(),
            counts.running,
            counts.completed,
            counts.error,
            counts.cancelled
        ));

        Ok(CallToolResult::text(lines.join("\n")))
    }
}

// ============================================================================
// screenshot
// ============================================================================

#[derive(Debug, Deserialize)]
struct Direction {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ScreenshotArgs {
    output_path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    direction: Option<Direction>,
    view_distance: Option<u32>,
}

impl ScreenshotArgs {
    fn request(&self) -> ScreenshotRequest {
        let defaults = ScreenshotRequest::default();
        ScreenshotRequest {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            direction: self
                .direction
                .as_ref()
                .map(|d| Vec3::new(d.x, d.y, d.z))
                .unwrap_or(defaults.direction),
            view_distance: self.view_distance.unwrap_or(defaults.view_distance),
        }
    }
}

pub struct ScreenshotCommand;

impl ScreenshotCommand {
    async fn capture(ctx: &CommandContext, args: &ScreenshotArgs) -> Result<CallToolResult> {
        let session = ctx.session.require_ready()?;
        let request = args.request();
        debug!(width = request.width, height = request.height, "Taking screenshot");

        let image = session.handle.screenshot(&request).await?;

        match &args.output_path {
            Some(path) => {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                tokio::fs::write(path, &image).await?;
                info!(path = %path, bytes = image.len(), "Screenshot saved");
                Ok(CallToolResult::text(format!("Screenshot saved to {}", path)))
            }
            None => {
                let data = base64::engine::general_purpose::STANDARD.encode(&image);
                Ok(CallToolResult::image(data, "image/jpeg"))
            }
        }
    }
}

#[async_trait]
impl Command for ScreenshotCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder(
            "screenshot",
            "Take a screenshot of the bot's view. Returns the image as base64 JPEG or saves to a file.",
        )
        .string_param(
            "output_path",
            "Optional file path to save the screenshot (e.g., '/tmp/screenshot.jpg'). If not provided, returns base64 image data.",
            false,
        )
        .number_param("width", "Image width in pixels (default: 512)", false)
        .number_param("height", "Image height in pixels (default: 512)", false)
        .vector_param(
            "direction",
            "Direction to look (relative to bot position). Default: { x: 1, y: -0.2, z: 0 }",
            false,
        )
        .number_param("view_distance", "View distance in chunks (default: 4)", false)
        .build()
    }

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult> {
        let args: ScreenshotArgs = parse_args(args)?;
        match Self::capture(ctx, &args).await {
            Ok(result) => Ok(result),
            Err(Error::NotConnected) => Err(Error::NotConnected),
            Err(err) => Ok(CallToolResult::error(format!("Screenshot error: {}", err))),
        }
    }
}
