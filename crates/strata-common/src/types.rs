//! Core types for Strata
//!
//! Data model shared by the ingress service, the routing client and the
//! storage backends.

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::{Error, Result};

/// Header carrying the JSON-encoded [`PathRequest`]
pub const API_ARG_HEADER: &str = "clawio-api-arg";

/// Header carrying the caller's trace identifier
pub const TRACE_ID_HEADER: &str = "x-clawio-tid";

/// Header (and query parameter) carrying the client-side checksum
pub const CHECKSUM_HEADER: &str = "checksum";

/// Content type of every downloaded file
pub const FILE_CONTENT_TYPE: &str = "clawio/file";

/// Registry role of storage-serving processes
pub const DATA_NODE_ROLE: &str = "data-node";

/// Streamed file contents; never buffered whole in memory.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Opaque key-value payload carried alongside a request
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// One storage-serving process as listed by the registry
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryNode {
    /// Role tag, e.g. `data-node`
    pub role: String,
    /// Base URL without trailing slash
    pub url: String,
}

impl RegistryNode {
    pub fn new(role: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            role: role.into(),
            url: url.trim_end_matches('/').to_string(),
        }
    }
}

/// Per-request argument bundle sent in the `clawio-api-arg` header
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PathRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
}

impl PathRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extra: None,
        }
    }

    /// Decode the header value, failing with `BadInputData`
    pub fn from_header_value(value: &str) -> Result<Self> {
        serde_json::from_str(value)
            .map_err(|_| Error::bad_input_data("invalid json in clawio-api-arg header"))
    }

    pub fn to_header_value(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::internal(format!("error encoding path request: {e}")))
    }

    /// Path rooted at `/` with `.` and `..` collapsed
    #[must_use]
    pub fn normalized_path(&self) -> String {
        normalize_path(&self.path)
    }
}

/// Authenticated caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    pub display_name: String,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: String::new(),
            display_name: String::new(),
        }
    }
}

/// Read-only projection of a backend entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub folder: bool,
    pub size: u64,
    /// Last modification, nanoseconds since the Unix epoch
    pub modified: i64,
    /// Backend-supplied checksum, may be empty
    pub checksum: String,
    #[serde(default)]
    pub extra: Extra,
}

/// Clean a user-supplied path into an absolute one.
///
/// Empty segments and `.` are dropped, `..` pops a segment and never climbs
/// above the root.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Last segment of a normalized path (`/` for the root)
#[must_use]
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "/",
    }
}
