//! # Configuration Utilities
//!
//! Settings shared by the server and client binaries. Values come from an
//! optional TOML file and are overridden by positional command-line
//! arguments. A bad port never stops a binary: it falls back to
//! [`DEFAULT_PORT`] with a warning.

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use super::error::{RelayError, Result};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_CLIENT_HOST: &str = "localhost";
pub const DEFAULT_CLIENT_NAME: &str = "Client";

/// Load a TOML configuration file and deserialize it into the specified type.
///
/// # Example
/// ```ignore
/// let config: RelayConfig = load_config("config/relay.toml")?;
/// ```
pub fn load_config<T>(path: impl AsRef<Path>) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| RelayError::Config(format!("cannot parse {}: {}", path.display(), e)))
}

/// Parse a port argument, falling back to `default` with a warning.
pub fn parse_port(raw: &str, default: u16) -> u16 {
    match raw.trim().parse::<u16>() {
        Ok(port) => port,
        Err(_) => {
            warn!("⚠️  Invalid port '{}'. Using default port {}.", raw, default);
            default
        }
    }
}

/// Complete configuration file layout. Both sections are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl RelayConfig {
    /// Load from `path`, or fall back to defaults when there is no usable file.
    pub fn load_or_default(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("⚠️  {}. Using defaults.", e);
                Self::default()
            }
        }
    }
}

/// Where the relay server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which server a client connects to and the name it sends under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CLIENT_HOST.to_string(),
            port: DEFAULT_PORT,
            name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("6000", DEFAULT_PORT), 6000);
        assert_eq!(parse_port(" 7000 ", DEFAULT_PORT), 7000);
        assert_eq!(parse_port("abc", DEFAULT_PORT), DEFAULT_PORT);
        assert_eq!(parse_port("70000", DEFAULT_PORT), DEFAULT_PORT);
        assert_eq!(parse_port("-1", DEFAULT_PORT), DEFAULT_PORT);
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.client.host, "localhost");
        assert_eq!(config.client.name, "Client");
        assert_eq!(config.client.server_address(), "localhost:5000");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 6100\n\n[client]\nname = \"Alice\"").unwrap();

        let config: RelayConfig = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 6100);
        assert_eq!(config.server.host, DEFAULT_SERVER_HOST);
        assert_eq!(config.client.name, "Alice");
        assert_eq!(config.client.port, DEFAULT_PORT);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let result: Result<RelayConfig> = load_config("/nonexistent/relay.toml");
        assert!(matches!(result, Err(RelayError::Config(_))));

        let config = RelayConfig::load_or_default(Some("/nonexistent/relay.toml"));
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_invalid_toml_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = RelayConfig::load_or_default(Some(&path));
        assert_eq!(config.client, ClientConfig::default());
    }
}
