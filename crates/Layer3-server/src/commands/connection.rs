//! connect / disconnect

use super::{parse_args, Command, CommandContext, CommandDef};
use async_trait::async_trait;
use mcbot_core::mcp::{CallToolResult, CommandDescriptor};
use mcbot_core::{ConnectParams, DisconnectOutcome};
use mcbot_foundation::{AuthMode, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

// ============================================================================
// connect
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ConnectArgs {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    auth: Option<AuthMode>,
}

pub struct ConnectCommand;

#[async_trait]
impl Command for ConnectCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder("connect", "Connect the bot to a Minecraft server")
            .string_param(
                "host",
                "Minecraft server host (default: localhost)",
                false,
            )
            .number_param("port", "Minecraft server port (default: 25565)", false)
            .string_param("username", "Bot username (default: mcp-bot)", false)
            .enum_param(
                "auth",
                "Auth mode: 'offline' for cracked servers, 'microsoft' for premium (default: microsoft)",
                &["offline", "microsoft"],
                false,
            )
            .build()
    }

    async fn execute(&self, ctx: &CommandContext, args: Value) -> Result<CallToolResult> {
        let args: ConnectArgs = parse_args(args)?;

        let mut params = ConnectParams::from(&ctx.defaults);
        if let Some(host) = args.host {
            params.host = host;
        }
        if let Some(port) = args.port {
            params.port = port;
        }
        if let Some(username) = args.username {
            params.username = username;
        }
        if let Some(auth) = args.auth {
            params.auth = auth;
        }

        info!(host = %params.host, port = params.port, username = %params.username, "Connecting");
        let ready = ctx.session.connect(params).await?;

        Ok(CallToolResult::text(format!(
            "Connected to {}:{} as {}. Bot is ready (version {}). Viewer on port {}.",
            ready.params.host,
            ready.params.port,
            ready.params.username,
            ready.version,
            ready.params.viewer_port
        )))
    }
}

// ============================================================================
// disconnect
// ============================================================================

pub struct DisconnectCommand;

#[async_trait]
impl Command for DisconnectCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDef::builder("disconnect", "Disconnect the bot from the Minecraft server").build()
    }

    async fn execute(&self, ctx: &CommandContext, _args: Value) -> Result<CallToolResult> {
        let text = match ctx.session.disconnect().await? {
            DisconnectOutcome::Disconnected => "Disconnected from server.",
            DisconnectOutcome::NotConnected => "Bot is not connected.",
        };
        Ok(CallToolResult::text(text))
    }
}
