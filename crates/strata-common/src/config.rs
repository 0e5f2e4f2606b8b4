//! Configuration sections shared by Strata binaries
//!
//! Each section deserializes from TOML with per-field defaults so a partial
//! file (or none at all) still yields a usable configuration.

use serde::{Deserialize, Serialize};

use crate::types::DATA_NODE_ROLE;

/// Upload limits enforced by the ingress service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Hard ceiling for a single upload in bytes (default: 8 GiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

/// Node discovery settings for the routing client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Registry role the client routes to
    #[serde(default = "default_role")]
    pub role: String,
    /// How long a node list is served from cache (seconds)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_max_file_size() -> u64 {
    8 * 1024 * 1024 * 1024 // 8 GiB
}

fn default_role() -> String {
    DATA_NODE_ROLE.to_string()
}

const fn default_cache_ttl_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
