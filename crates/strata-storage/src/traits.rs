//! Storage backend trait
//!
//! Every operation takes the authenticated user and a path relative to that
//! user's namespace. Failures are taxonomy-coded [`strata_common::Error`]s;
//! callers discriminate on `NotFound` and `BadChecksum` in particular.

use async_trait::async_trait;
use strata_common::{ByteStream, FileInfo, Result, User};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Prepare the user's namespace; safe to call repeatedly
    async fn init(&self, user: &User) -> Result<()>;

    /// Stream `body` into `path`, verifying it against `checksum`.
    ///
    /// An empty checksum skips verification. A failed or mismatching upload
    /// leaves no entry behind.
    async fn upload_file(
        &self,
        user: &User,
        path: &str,
        body: ByteStream,
        checksum: &str,
    ) -> Result<()>;

    /// Open `path` for streaming; the caller owns the returned stream
    async fn download_file(&self, user: &User, path: &str) -> Result<ByteStream>;

    async fn examine(&self, user: &User, path: &str) -> Result<FileInfo>;

    async fn list_folder(&self, user: &User, path: &str) -> Result<Vec<FileInfo>>;

    /// Remove a file or a folder with its contents; missing paths are not an error
    async fn delete(&self, user: &User, path: &str) -> Result<()>;

    async fn move_entry(&self, user: &User, source: &str, target: &str) -> Result<()>;

    async fn create_folder(&self, user: &User, path: &str) -> Result<()>;
}
