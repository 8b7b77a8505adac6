//! florad.toml configuration parser.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Optional coordinator configuration, read from `<root>/config/florad.toml`.
///
/// Command-line flags win over everything here; the file exists so an
/// installation can pin its bind address and the externally reachable URL
/// without wrapping the binary in a launch script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloradConfig {
    pub server: Option<ServerConfig>,
    pub venv: Option<VenvConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Base URL handed to agents; defaults to `http://<host>:<port>`.
    pub advertise_url: Option<String>,
}

/// Record of the managed Python environment, written by the bootstrap tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenvConfig {
    pub name: String,
    pub path: String,
    pub python: String,
    pub activate: String,
}

impl FloradConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FloradConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Read the config if present; a missing file is the default config.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let raw = r#"
[server]
host = "0.0.0.0"
port = 8080
advertise_url = "http://login01:8080"

[venv]
name = "flowerai"
path = "/home/alice/.florad/venv/flowerai-env"
python = "/home/alice/.florad/venv/flowerai-env/bin/python"
activate = "/home/alice/.florad/venv/flowerai-env/bin/activate"
"#;
        let config: FloradConfig = toml::from_str(raw).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.advertise_url.as_deref(), Some("http://login01:8080"));
        assert_eq!(config.venv.unwrap().name, "flowerai");
    }

    #[test]
    fn empty_file_is_the_default() {
        let config: FloradConfig = toml::from_str("").unwrap();
        assert!(config.server.is_none());
        assert!(config.venv.is_none());
    }

    #[test]
    fn missing_file_loads_default() {
        let config = FloradConfig::load_or_default(Path::new("/nonexistent/florad.toml")).unwrap();
        assert!(config.server.is_none());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = FloradConfig {
            server: Some(ServerConfig {
                host: Some("127.0.0.1".to_string()),
                port: Some(9000),
                advertise_url: None,
            }),
            venv: None,
        };
        let raw = config.to_toml_string().unwrap();
        let parsed: FloradConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.server.unwrap().port, Some(9000));
    }
}
