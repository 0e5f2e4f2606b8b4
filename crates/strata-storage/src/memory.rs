//! In-memory storage backend
//!
//! Holds every entry in a single map keyed by `(username, path)`. Each
//! user's root folder always exists. File contents are kept whole, so this
//! backend suits tests and small ephemeral nodes only.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use strata_common::{
    ByteStream, Error, ExpectedChecksum, FileInfo, Result, User, normalize_path, sha256_checksum,
};
use tracing::{debug, info};

use crate::parent_path;
use crate::traits::StorageBackend;

#[derive(Clone, Debug)]
enum Entry {
    Folder { modified: i64 },
    File { data: Bytes, modified: i64, checksum: String },
}

type Key = (String, String);

/// Process-local storage
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<Key, Entry>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
    }

    fn key(user: &User, path: &str) -> Key {
        (user.username.clone(), path.to_string())
    }

    fn is_folder(entries: &BTreeMap<Key, Entry>, user: &User, path: &str) -> bool {
        path == "/" || matches!(entries.get(&Self::key(user, path)), Some(Entry::Folder { .. }))
    }

    fn is_descendant(candidate: &str, folder: &str) -> bool {
        candidate
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn info(path: &str, entry: &Entry) -> FileInfo {
        match entry {
            Entry::Folder { modified } => FileInfo {
                path: path.to_string(),
                folder: true,
                size: 0,
                modified: *modified,
                checksum: String::new(),
                extra: serde_json::Map::new(),
            },
            Entry::File {
                data,
                modified,
                checksum,
            } => FileInfo {
                path: path.to_string(),
                folder: false,
                size: data.len() as u64,
                modified: *modified,
                checksum: checksum.clone(),
                extra: serde_json::Map::new(),
            },
        }
    }

    fn root_info() -> FileInfo {
        FileInfo {
            path: "/".to_string(),
            folder: true,
            size: 0,
            modified: 0,
            checksum: String::new(),
            extra: serde_json::Map::new(),
        }
    }
}

fn non_root(path: &str) -> Result<String> {
    let clean = normalize_path(path);
    if clean == "/" {
        return Err(Error::forbidden("operation not allowed on the root folder"));
    }
    Ok(clean)
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn init(&self, _user: &User) -> Result<()> {
        Ok(())
    }

    async fn upload_file(
        &self,
        user: &User,
        path: &str,
        mut body: ByteStream,
        checksum: &str,
    ) -> Result<()> {
        let expected = ExpectedChecksum::parse(checksum)?;
        let path = non_root(path)?;

        {
            let entries = self.entries.read();
            if !Self::is_folder(&entries, user, parent_path(&path)) {
                return Err(Error::not_found(format!(
                    "parent folder of {path} does not exist"
                )));
            }
            if Self::is_folder(&entries, user, &path) {
                return Err(Error::bad_input_data(format!("{path} is a folder")));
            }
        }

        let mut calculator = expected.as_ref().map(ExpectedChecksum::calculator);
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk =
                chunk.map_err(|e| Error::upload_is_partial(format!("upload interrupted: {e}")))?;
            if let Some(calc) = calculator.as_mut() {
                calc.update(&chunk);
            }
            buf.extend_from_slice(&chunk);
        }

        if let (Some(expected), Some(calc)) = (expected.as_ref(), calculator) {
            expected.verify(&calc.finalize())?;
        }

        let data = buf.freeze();
        let entry = Entry::File {
            checksum: sha256_checksum(&data),
            data,
            modified: Self::now(),
        };
        {
            // the tree may have changed while the body was streaming
            let mut entries = self.entries.write();
            if !Self::is_folder(&entries, user, parent_path(&path)) {
                return Err(Error::not_found(format!(
                    "parent folder of {path} does not exist"
                )));
            }
            if Self::is_folder(&entries, user, &path) {
                return Err(Error::bad_input_data(format!("{path} is a folder")));
            }
            entries.insert(Self::key(user, &path), entry);
        }
        info!("file stored in memory: {}", path);
        Ok(())
    }

    async fn download_file(&self, user: &User, path: &str) -> Result<ByteStream> {
        let path = normalize_path(path);
        let entries = self.entries.read();
        match entries.get(&Self::key(user, &path)) {
            Some(Entry::File { data, .. }) => {
                let data = data.clone();
                Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
            }
            Some(Entry::Folder { .. }) => Err(Error::bad_input_data(format!("{path} is a folder"))),
            None if path == "/" => Err(Error::bad_input_data("/ is a folder")),
            None => Err(Error::not_found(format!("{path} not found"))),
        }
    }

    async fn examine(&self, user: &User, path: &str) -> Result<FileInfo> {
        let path = normalize_path(path);
        if path == "/" {
            return Ok(Self::root_info());
        }
        self.entries
            .read()
            .get(&Self::key(user, &path))
            .map(|entry| Self::info(&path, entry))
            .ok_or_else(|| Error::not_found(format!("{path} not found")))
    }

    async fn list_folder(&self, user: &User, path: &str) -> Result<Vec<FileInfo>> {
        let folder = normalize_path(path);
        let entries = self.entries.read();
        if !Self::is_folder(&entries, user, &folder) {
            return if entries.contains_key(&Self::key(user, &folder)) {
                Err(Error::bad_input_data(format!("{folder:?} is not a folder")))
            } else {
                Err(Error::not_found(format!("{folder} not found")))
            };
        }

        let infos: Vec<FileInfo> = entries
            .iter()
            .filter(|((owner, p), _)| {
                owner == &user.username && p != &folder && parent_path(p) == folder
            })
            .map(|((_, p), entry)| Self::info(p, entry))
            .collect();
        debug!("folder {} listed: {} entries", folder, infos.len());
        Ok(infos)
    }

    async fn delete(&self, user: &User, path: &str) -> Result<()> {
        let path = non_root(path)?;
        self.entries.write().retain(|(owner, p), _| {
            owner != &user.username || (p != &path && !Self::is_descendant(p, &path))
        });
        Ok(())
    }

    async fn move_entry(&self, user: &User, source: &str, target: &str) -> Result<()> {
        let source = non_root(source)?;
        let target = non_root(target)?;
        let mut entries = self.entries.write();

        if !entries.contains_key(&Self::key(user, &source)) {
            return Err(Error::not_found(format!("{source} not found")));
        }
        if !Self::is_folder(&entries, user, parent_path(&target)) {
            return Err(Error::not_found(format!(
                "parent folder of {target} does not exist"
            )));
        }
        if target == source || Self::is_descendant(&target, &source) {
            return Err(Error::bad_input_data(format!(
                "cannot move {source} into itself"
            )));
        }

        let moved: Vec<Key> = entries
            .keys()
            .filter(|(owner, p)| {
                owner == &user.username && (p == &source || Self::is_descendant(p, &source))
            })
            .cloned()
            .collect();
        for key in moved {
            if let Some(entry) = entries.remove(&key) {
                let renamed = format!("{target}{}", &key.1[source.len()..]);
                entries.insert(Self::key(user, &renamed), entry);
            }
        }
        Ok(())
    }

    async fn create_folder(&self, user: &User, path: &str) -> Result<()> {
        let path = non_root(path)?;
        let mut entries = self.entries.write();
        if entries.contains_key(&Self::key(user, &path)) {
            return Err(Error::already_exist("folder already exist"));
        }
        if !Self::is_folder(&entries, user, parent_path(&path)) {
            return Err(Error::not_found(format!(
                "parent folder of {path} does not exist"
            )));
        }
        entries.insert(
            Self::key(user, &path),
            Entry::Folder {
                modified: Self::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::ErrorKind;

    fn body(data: &'static [u8]) -> ByteStream {
        Box::pin(futures::stream::iter(vec![Ok(Bytes::from_static(data))]))
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_upload_examine_download() {
        let backend = MemoryBackend::new();
        let user = User::new("bob");
        backend
            .upload_file(&user, "/a.txt", body(b"data"), "")
            .await
            .unwrap();

        let info = backend.examine(&user, "a.txt").await.unwrap();
        assert_eq!(info.size, 4);
        assert_eq!(info.checksum, sha256_checksum(b"data"));

        let data = read_all(backend.download_file(&user, "/a.txt").await.unwrap()).await;
        assert_eq!(data, b"data");

        // namespaces are per user
        let other = User::new("carol");
        assert!(
            backend
                .download_file(&other, "/a.txt")
                .await
                .err()
                .unwrap()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_checksum_mismatch() {
        let backend = MemoryBackend::new();
        let user = User::new("bob");
        let err = backend
            .upload_file(&user, "/a.txt", body(b"data"), &sha256_checksum(b"other"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadChecksum);
        assert!(backend.examine(&user, "/a.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_move_folder_with_children() {
        let backend = MemoryBackend::new();
        let user = User::new("bob");
        backend.create_folder(&user, "/docs").await.unwrap();
        backend.create_folder(&user, "/docs/old").await.unwrap();
        backend
            .upload_file(&user, "/docs/old/x", body(b"x"), "")
            .await
            .unwrap();
        backend.create_folder(&user, "/archive").await.unwrap();

        backend
            .move_entry(&user, "/docs/old", "/archive/old")
            .await
            .unwrap();
        assert!(backend.examine(&user, "/archive/old/x").await.is_ok());
        assert!(backend.examine(&user, "/docs/old/x").await.is_err());

        let listing = backend.list_folder(&user, "/").await.unwrap();
        let paths: Vec<_> = listing.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/archive", "/docs"]);

        let err = backend
            .move_entry(&user, "/archive", "/archive/inner")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInputData);
    }

    #[tokio::test]
    async fn test_delete_is_recursive_and_idempotent() {
        let backend = MemoryBackend::new();
        let user = User::new("bob");
        backend.create_folder(&user, "/docs").await.unwrap();
        backend
            .upload_file(&user, "/docs/a", body(b"a"), "")
            .await
            .unwrap();
        backend
            .upload_file(&user, "/docsa", body(b"b"), "")
            .await
            .unwrap();

        backend.delete(&user, "/docs").await.unwrap();
        assert!(backend.examine(&user, "/docs/a").await.is_err());
        assert!(backend.examine(&user, "/docsa").await.is_ok());
        backend.delete(&user, "/docs").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_folder_errors() {
        let backend = MemoryBackend::new();
        let user = User::new("bob");
        backend.create_folder(&user, "/docs").await.unwrap();
        let err = backend.create_folder(&user, "/docs").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExist);
        let err = backend.create_folder(&user, "/a/b").await.unwrap_err();
        assert!(err.is_not_found());
        let err = backend.create_folder(&user, "/").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_parent_deleted_during_upload() {
        let backend = MemoryBackend::new();
        let user = User::new("bob");
        backend.create_folder(&user, "/docs").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let late: ByteStream = Box::pin(futures::stream::once(async move {
            rx.await.ok();
            Ok::<_, std::io::Error>(Bytes::from_static(b"late"))
        }));

        let (uploaded, ()) = tokio::join!(
            backend.upload_file(&user, "/docs/a.txt", late, ""),
            async {
                backend.delete(&user, "/docs").await.unwrap();
                tx.send(()).unwrap();
            }
        );

        assert!(uploaded.unwrap_err().is_not_found());
        assert!(backend.examine(&user, "/docs/a.txt").await.unwrap_err().is_not_found());
        assert!(backend.list_folder(&user, "/").await.unwrap().is_empty());
    }
}
