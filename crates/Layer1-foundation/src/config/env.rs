//! 환경 변수 오버레이
//!
//! 파일 설정 위에 덮어쓰며, CLI 플래그보다는 우선순위가 낮다.

use super::mcbot::McbotConfig;
use crate::{Error, Result};
use std::str::FromStr;

pub const ENV_MC_HOST: &str = "MC_HOST";
pub const ENV_MC_PORT: &str = "MC_PORT";
pub const ENV_MC_USERNAME: &str = "MC_USERNAME";
pub const ENV_MC_PASSWORD: &str = "MC_PASSWORD";
pub const ENV_MC_AUTH: &str = "MC_AUTH";
pub const ENV_VIEWER_PORT: &str = "VIEWER_PORT";
pub const ENV_MCP_PORT: &str = "MCP_PORT";
pub const ENV_MCP_TRANSPORT: &str = "MCP_TRANSPORT";
pub const ENV_BACKEND: &str = "MCBOT_BACKEND";
pub const ENV_BRIDGE_COMMAND: &str = "MCBOT_BRIDGE_COMMAND";

impl McbotConfig {
    /// 환경 변수 적용
    ///
    /// `lookup` is injected so tests never touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get(ENV_MC_HOST) {
            self.connection.host = host;
        }
        if let Some(port) = get(ENV_MC_PORT) {
            self.connection.port = parse_var(ENV_MC_PORT, &port)?;
        }
        if let Some(username) = get(ENV_MC_USERNAME) {
            self.connection.username = username;
        }
        if let Some(password) = get(ENV_MC_PASSWORD) {
            self.connection.password = Some(password);
        }
        if let Some(auth) = get(ENV_MC_AUTH) {
            self.connection.auth = auth.parse()?;
        }
        if let Some(port) = get(ENV_VIEWER_PORT) {
            self.connection.viewer_port = parse_var(ENV_VIEWER_PORT, &port)?;
        }
        if let Some(port) = get(ENV_MCP_PORT) {
            self.server.http_port = parse_var(ENV_MCP_PORT, &port)?;
        }
        if let Some(transport) = get(ENV_MCP_TRANSPORT) {
            self.server.transport = transport.parse()?;
        }
        if let Some(kind) = get(ENV_BACKEND) {
            self.backend.kind = kind.parse()?;
        }
        if let Some(command) = get(ENV_BRIDGE_COMMAND) {
            self.backend.command = Some(command);
        }

        Ok(())
    }

    /// 기본값 + 프로세스 환경 변수
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthMode, BackendKind, TransportKind};
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = McbotConfig::new();
        config
            .apply_env(lookup(&[
                ("MC_HOST", "play.example.net"),
                ("MC_PORT", "25570"),
                ("MC_AUTH", "offline"),
                ("MCP_TRANSPORT", "http"),
                ("MCP_PORT", "8080"),
                ("MCBOT_BACKEND", "simulated"),
            ]))
            .unwrap();

        assert_eq!(config.connection.host, "play.example.net");
        assert_eq!(config.connection.port, 25570);
        assert_eq!(config.connection.auth, AuthMode::Offline);
        assert_eq!(config.server.transport, TransportKind::Http);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.backend.kind, BackendKind::Simulated);
        assert_eq!(config.connection.username, "mcp-bot");
    }

    #[test]
    fn test_empty_values_ignored() {
        let mut config = McbotConfig::new();
        config.apply_env(lookup(&[("MC_HOST", "  ")])).unwrap();
        assert_eq!(config.connection.host, "localhost");
    }

    #[test]
    fn test_invalid_port() {
        let mut config = McbotConfig::new();
        let err = config.apply_env(lookup(&[("MC_PORT", "abc")])).unwrap_err();
        assert!(err.to_string().contains("MC_PORT"));
    }
}
