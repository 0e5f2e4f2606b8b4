//! Local filesystem backend
//!
//! Entries live under `<data_dir>/<username>/<path>`. Uploads are streamed
//! into `temp_dir` first and renamed into place once the checksum has been
//! verified, so `temp_dir` must be on the same filesystem as `data_dir`.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use strata_common::{
    ByteStream, Error, ExpectedChecksum, FileInfo, Result, User, normalize_path,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::join_path;
use crate::traits::StorageBackend;

/// Filesystem-backed storage rooted at a data folder
pub struct LocalFsBackend {
    data_dir: PathBuf,
    temp_dir: PathBuf,
}

impl LocalFsBackend {
    /// Create the backend, creating both folders if needed
    ///
    /// `temp_dir` must not live inside `data_dir`, where it would be
    /// reachable as some user's namespace.
    pub async fn new(data_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let temp_dir = temp_dir.into();
        fs::create_dir_all(&data_dir).await?;
        fs::create_dir_all(&temp_dir).await?;
        let data_dir = fs::canonicalize(&data_dir).await?;
        let temp_dir = fs::canonicalize(&temp_dir).await?;
        if temp_dir.starts_with(&data_dir) {
            error!(
                "temporary folder {} is inside data folder {}",
                temp_dir.display(),
                data_dir.display()
            );
            return Err(Error::bad_input_data(format!(
                "temp_dir {} must not be inside data_dir {}",
                temp_dir.display(),
                data_dir.display()
            )));
        }
        info!(
            "Local storage at {} (temporary files in {})",
            data_dir.display(),
            temp_dir.display()
        );
        Ok(Self { data_dir, temp_dir })
    }

    fn user_root(&self, user: &User) -> Result<PathBuf> {
        let name = user.username.as_str();
        // dot names are reserved for node-side folders
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(Error::forbidden(format!("invalid username {name:?}")));
        }
        Ok(self.data_dir.join(name))
    }

    fn local_path(&self, user: &User, path: &str) -> Result<PathBuf> {
        let clean = normalize_path(path);
        Ok(self.user_root(user)?.join(clean.trim_start_matches('/')))
    }

    /// Like `local_path` but refuses the user's root folder
    fn entry_path(&self, user: &User, path: &str) -> Result<PathBuf> {
        if normalize_path(path) == "/" {
            return Err(Error::forbidden("operation not allowed on the root folder"));
        }
        self.local_path(user, path)
    }

    fn convert(path: String, meta: &std::fs::Metadata) -> FileInfo {
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX));
        FileInfo {
            path,
            folder: meta.is_dir(),
            size: meta.len(),
            modified,
            checksum: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    async fn stream_to_temp(
        file: &mut fs::File,
        mut body: ByteStream,
        expected: Option<&ExpectedChecksum>,
    ) -> Result<Option<String>> {
        let mut calculator = expected.map(ExpectedChecksum::calculator);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                warn!("upload body interrupted: {}", e);
                Error::upload_is_partial(format!("upload interrupted: {e}"))
            })?;
            if let Some(calc) = calculator.as_mut() {
                calc.update(&chunk);
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(calculator.map(|c| c.finalize()))
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!("failed to remove temporary file {}: {}", path.display(), e);
    }
}

#[async_trait]
impl StorageBackend for LocalFsBackend {
    async fn init(&self, user: &User) -> Result<()> {
        fs::create_dir_all(self.user_root(user)?).await?;
        Ok(())
    }

    async fn upload_file(
        &self,
        user: &User,
        path: &str,
        body: ByteStream,
        checksum: &str,
    ) -> Result<()> {
        let expected = ExpectedChecksum::parse(checksum)?;
        let target = self.entry_path(user, path)?;

        let parent_is_dir = match target.parent() {
            Some(parent) => fs::metadata(parent).await.is_ok_and(|m| m.is_dir()),
            None => false,
        };
        if !parent_is_dir {
            return Err(Error::not_found(format!(
                "parent folder of {} does not exist",
                normalize_path(path)
            )));
        }
        if fs::metadata(&target).await.is_ok_and(|m| m.is_dir()) {
            return Err(Error::bad_input_data(format!(
                "{} is a folder",
                normalize_path(path)
            )));
        }

        let temp_path = self.temp_dir.join(uuid::Uuid::new_v4().to_string());
        let mut file = fs::File::create(&temp_path).await?;

        let digest = match Self::stream_to_temp(&mut file, body, expected.as_ref()).await {
            Ok(digest) => digest,
            Err(e) => {
                drop(file);
                remove_quietly(&temp_path).await;
                return Err(e);
            }
        };
        drop(file);

        if let (Some(expected), Some(actual)) = (expected.as_ref(), digest.as_deref()) {
            if let Err(e) = expected.verify(actual) {
                error!("file corruption on upload to {}: {}", target.display(), e);
                remove_quietly(&temp_path).await;
                return Err(e);
            }
        }

        if let Err(e) = fs::rename(&temp_path, &target).await {
            remove_quietly(&temp_path).await;
            return Err(e.into());
        }
        info!("file uploaded to {}", target.display());
        Ok(())
    }

    async fn download_file(&self, user: &User, path: &str) -> Result<ByteStream> {
        let local = self.local_path(user, path)?;
        let meta = fs::metadata(&local).await?;
        if meta.is_dir() {
            return Err(Error::bad_input_data(format!(
                "{} is a folder",
                normalize_path(path)
            )));
        }
        let file = fs::File::open(&local).await?;
        debug!("file opened for download: {}", local.display());
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn examine(&self, user: &User, path: &str) -> Result<FileInfo> {
        let local = self.local_path(user, path)?;
        let meta = fs::metadata(&local).await?;
        debug!("file examined: {}", local.display());
        Ok(Self::convert(normalize_path(path), &meta))
    }

    async fn list_folder(&self, user: &User, path: &str) -> Result<Vec<FileInfo>> {
        let folder = normalize_path(path);
        let local = self.local_path(user, path)?;
        let meta = fs::metadata(&local).await?;
        if !meta.is_dir() {
            return Err(Error::bad_input_data(format!("{folder:?} is not a folder")));
        }

        let mut entries = fs::read_dir(&local).await?;
        let mut infos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            infos.push(Self::convert(join_path(&folder, &name), &meta));
        }
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("folder {} read: {} entries", local.display(), infos.len());
        Ok(infos)
    }

    async fn delete(&self, user: &User, path: &str) -> Result<()> {
        let local = self.entry_path(user, path)?;
        let result = match fs::symlink_metadata(&local).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&local).await,
            Ok(_) => fs::remove_file(&local).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        result?;
        info!("file deleted: {}", local.display());
        Ok(())
    }

    async fn move_entry(&self, user: &User, source: &str, target: &str) -> Result<()> {
        let source_local = self.entry_path(user, source)?;
        let target_local = self.entry_path(user, target)?;
        fs::rename(&source_local, &target_local)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::not_found(e.to_string()),
                _ => Error::bad_input_data(format!("cannot rename: {e}")),
            })?;
        info!(
            "file renamed: {} -> {}",
            source_local.display(),
            target_local.display()
        );
        Ok(())
    }

    async fn create_folder(&self, user: &User, path: &str) -> Result<()> {
        let local = self.entry_path(user, path)?;
        fs::create_dir(&local).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::already_exist("folder already exist"),
            _ => Error::from(e),
        })?;
        info!("folder created: {}", local.display());
        Ok(())
    }
}
