//! mcbot MCP server - Main entry point

mod cli;

use clap::Parser;
use cli::Args;
use mcbot_core::bridge::BridgeConnector;
use mcbot_core::session::sim::{SimOptions, SimulatedConnector};
use mcbot_core::{BotConnector, SessionLimits, SessionManager};
use mcbot_foundation::{BackendKind, McbotConfig, TransportKind};
use mcbot_server::{serve_http, serve_stdio, CommandContext, Dispatcher, McpServer};
use mcbot_task::{ScriptSandbox, TaskRegistry};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout 은 stdio 프로토콜 전용이므로 로그는 stderr 로
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    std::panic::set_hook(Box::new(|info| {
        error!("Panic: {}", info);
    }));

    let mut config = McbotConfig::load(args.config.as_deref())?;
    args.apply(&mut config)?;

    let connector: Arc<dyn BotConnector> = match config.backend.kind {
        BackendKind::Bridge => Arc::new(BridgeConnector::from_config(&config.backend)),
        BackendKind::Simulated => Arc::new(SimulatedConnector::new(SimOptions::default())),
    };
    info!(backend = connector.name(), "Starting mcbot");

    let session = SessionManager::spawn(connector, SessionLimits::from(&config.limits));
    let tasks = TaskRegistry::from_limits(
        session.clone(),
        Arc::new(ScriptSandbox::from_limits(&config.limits)),
        &config.limits,
    );
    let ctx = CommandContext::new(session.clone(), tasks, config.connection.clone());
    let server = McpServer::new(Dispatcher::with_builtins(ctx));

    let serve = async {
        match config.server.transport {
            TransportKind::Stdio => serve_stdio(server).await,
            TransportKind::Http => serve_http(server, config.server.http_port).await,
        }
    };

    let outcome = tokio::select! {
        result = serve => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    if let Err(e) = session.disconnect().await {
        warn!("Disconnect on shutdown failed: {}", e);
    }
    if let Err(e) = &outcome {
        error!("Server error: {}", e);
    }
    Ok(outcome?)
}
