//! Service configuration.
//!
//! Configuration is stored as TOML at the path named by `SEGSTORE_CONFIG`,
//! or else:
//! - Linux: `~/.config/segstore/service.toml`
//! - Windows: `%APPDATA%/segstore/service.toml`
//!
//! `SEGSTORE_STORAGE_DIR` overrides `storage_dir` from the file.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "SEGSTORE_CONFIG";

/// Environment variable overriding the storage directory.
pub const STORAGE_DIR_ENV: &str = "SEGSTORE_STORAGE_DIR";

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for stored files and working markers. Required.
    #[serde(default)]
    pub storage_dir: String,

    /// WebSocket server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind the WebSocket server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Stable identity reported by `get_info` (random per start if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_unique_id: Option<String>,
}

fn default_port() -> u16 {
    segstore_protocol::constants::DEFAULT_PORT
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: String::new(),
            port: default_port(),
            bind_address: default_bind_address(),
            service_unique_id: None,
        }
    }
}

impl Config {
    /// Loads configuration from disk and the environment, then validates it.
    ///
    /// A missing file is not an error as long as the environment supplies
    /// the storage directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(p) => PathBuf::from(p),
            None => config_path()?,
        };

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
            .validate()
            .with_context(|| format!("invalid configuration ({})", path.display()))?;
        Ok(config)
    }

    /// Parses a TOML configuration file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(STORAGE_DIR_ENV).filter(|d| !d.is_empty()) {
            self.storage_dir = dir;
        }
    }

    /// Checks required fields.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage_dir.trim().is_empty() {
            anyhow::bail!("storage_dir is required (or set {STORAGE_DIR_ENV})");
        }
        self.bind_ip()?;
        Ok(())
    }

    /// Parsed `bind_address`.
    pub fn bind_ip(&self) -> anyhow::Result<IpAddr> {
        self.bind_address
            .parse()
            .with_context(|| format!("invalid bind_address: {}", self.bind_address))
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("segstore")
            .join("service.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("segstore").join("service.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/segstore/service.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.storage_dir.is_empty());
        assert_eq!(config.port, 9876);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert!(config.service_unique_id.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            storage_dir: "/srv/segstore".into(),
            port: 8888,
            bind_address: "127.0.0.1".into(),
            service_unique_id: Some("svc-1".into()),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.storage_dir, "/srv/segstore");
        assert_eq!(parsed.port, 8888);
        assert_eq!(parsed.bind_address, "127.0.0.1");
        assert_eq!(parsed.service_unique_id.as_deref(), Some("svc-1"));
    }

    #[test]
    fn config_partial_toml() {
        let config: Config = toml::from_str(r#"storage_dir = "/data""#).unwrap();
        assert_eq!(config.storage_dir, "/data");
        assert_eq!(config.port, 9876);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_storage_dir() {
        let mut config: Config = toml::from_str(r#"storage_dir = "/data""#).unwrap();
        config.apply_env(|key| (key == STORAGE_DIR_ENV).then(|| "/override".to_string()));
        assert_eq!(config.storage_dir, "/override");

        // Empty values are ignored.
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config.storage_dir, "/override");
    }

    #[test]
    fn invalid_bind_address() {
        let config = Config {
            storage_dir: "/data".into(),
            bind_address: "not-an-ip".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("service.toml");
        std::fs::write(&path, "storage_dir = \"/x\"\nport = 1234\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage_dir, "/x");
        assert_eq!(config.port, 1234);
    }

    #[test]
    fn load_from_malformed_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("service.toml");
        std::fs::write(&path, "port = \"many\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("segstore"));
    }
}
