//! Strata Storage - per-node storage backends
//!
//! This crate defines the contract a data node's storage medium must satisfy
//! and ships two implementations:
//! - [`LocalFsBackend`]: one folder per user on a local filesystem
//! - [`MemoryBackend`]: process-local, for tests and ephemeral nodes

pub mod local;
pub mod memory;
pub mod traits;

// Re-exports
pub use local::LocalFsBackend;
pub use memory::MemoryBackend;
pub use traits::StorageBackend;

/// Parent of a normalized path (`/` for top-level entries)
pub(crate) fn parent_path(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

/// Join a child name onto a normalized folder path
pub(crate) fn join_path(folder: &str, name: &str) -> String {
    if folder == "/" {
        format!("/{name}")
    } else {
        format!("{folder}/{name}")
    }
}
