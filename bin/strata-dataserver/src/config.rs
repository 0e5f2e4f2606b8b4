//! Data node configuration file
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:9002"
//!
//! [upload]
//! max_file_size = 8589934592
//!
//! [storage]
//! backend = "local"
//! data_dir = "/var/lib/strata/data"
//! temp_dir = "/var/lib/strata/tmp"
//!
//! [auth]
//! jwt_secret = "change-me"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use strata_common::{LoggingConfig, UploadConfig};

/// Configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load `path` if it exists, defaults otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Storage backend implementation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Must be on the same filesystem as `data_dir`
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: default_data_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    /// Secret shared with the token issuer
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

fn default_listen() -> String {
    "0.0.0.0:9002".to_string()
}

fn default_data_dir() -> String {
    "./strata-data".to_string()
}

fn default_temp_dir() -> String {
    "./strata-tmp".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9002");
        assert_eq!(config.upload.max_file_size, 8 << 30);
        assert_eq!(config.storage.backend, BackendKind::Local);
        assert!(
            !std::path::Path::new(&config.storage.temp_dir)
                .starts_with(&config.storage.data_dir)
        );
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = Config::parse(
            r#"
            [upload]
            max_file_size = 1024

            [storage]
            backend = "memory"

            [auth]
            jwt_secret = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(config.upload.max_file_size, 1024);
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.storage.data_dir, "./strata-data");
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Config::parse("[storage]\nbackend = \"s3\"").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9002");
    }
}
