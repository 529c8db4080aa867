//! Command-line arguments

use clap::Parser;
use mcbot_foundation::{AuthMode, BackendKind, McbotConfig, Result, TransportKind};
use std::path::PathBuf;

/// mcbot - control a Minecraft bot through MCP
#[derive(Parser, Debug, Default)]
#[command(name = "mcbot-mcp")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Extra config file, merged over the global and project configs
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Transport to serve on (stdio, http)
    #[arg(long)]
    pub transport: Option<String>,

    /// HTTP port (with --transport http)
    #[arg(long)]
    pub port: Option<u16>,

    /// Game client backend (bridge, simulated)
    #[arg(long)]
    pub backend: Option<String>,

    /// Command that starts the bridge process
    #[arg(long)]
    pub bridge_command: Option<String>,

    /// Default Minecraft server host
    #[arg(long)]
    pub host: Option<String>,

    /// Default Minecraft server port
    #[arg(long)]
    pub mc_port: Option<u16>,

    /// Default bot username
    #[arg(long)]
    pub username: Option<String>,

    /// Default auth mode (offline, microsoft)
    #[arg(long)]
    pub auth: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    /// Apply flags over the loaded config; flags win
    pub fn apply(&self, config: &mut McbotConfig) -> Result<()> {
        if let Some(transport) = &self.transport {
            config.server.transport = transport.parse::<TransportKind>()?;
        }
        if let Some(port) = self.port {
            config.server.http_port = port;
        }
        if let Some(backend) = &self.backend {
            config.backend.kind = backend.parse::<BackendKind>()?;
        }
        if let Some(command) = &self.bridge_command {
            config.backend.command = Some(command.clone());
        }
        if let Some(host) = &self.host {
            config.connection.host = host.clone();
        }
        if let Some(port) = self.mc_port {
            config.connection.port = port;
        }
        if let Some(username) = &self.username {
            config.connection.username = username.clone();
        }
        if let Some(auth) = &self.auth {
            config.connection.auth = auth.parse::<AuthMode>()?;
        }
        Ok(())
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "mcbot-mcp",
            "--transport",
            "http",
            "--port",
            "8080",
            "--backend",
            "simulated",
            "--host",
            "mc.example.net",
            "--mc-port",
            "25570",
            "--auth",
            "offline",
        ]);

        let mut config = McbotConfig::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.server.transport, TransportKind::Http);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.backend.kind, BackendKind::Simulated);
        assert_eq!(config.connection.host, "mc.example.net");
        assert_eq!(config.connection.port, 25570);
        assert_eq!(config.connection.auth, AuthMode::Offline);
        assert_eq!(config.connection.username, "mcp-bot");
        assert_eq!(args.log_level(), "info");
    }

    #[test]
    fn test_invalid_flag_value() {
        let args = Args::parse_from(["mcbot-mcp", "--transport", "carrier-pigeon"]);
        let err = args.apply(&mut McbotConfig::default()).unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }
}
