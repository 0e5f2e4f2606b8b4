//! Strata Common - Shared types and utilities
//!
//! This crate provides the error taxonomy, the data model that crosses
//! component boundaries, and helpers used by every Strata component.

pub mod checksum;
pub mod config;
pub mod error;
pub mod mime;
pub mod types;

pub use checksum::{ChecksumAlgorithm, ChecksumCalculator, ExpectedChecksum, sha256_checksum};
pub use config::{LoggingConfig, RoutingConfig, UploadConfig};
pub use error::{Error, ErrorEnvelope, ErrorKind, Result};
pub use mime::{DEFAULT_MIME_TYPE, FOLDER_MIME_TYPE, mime_type, mime_type_for_path};
pub use types::*;
