//! Filesystem-backed object store.
//!
//! Keys map to files under a root directory. Writes go to a temp file in
//! the same directory and are renamed into place, so readers never observe
//! a partially written object.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use narrate_core::paths::is_safe_key;
use narrate_core::{ObjectStore, PutOptions, StorageError, StoredObject};
use tracing::debug;
use url::Url;

/// Suffix of in-flight writes; never listed.
const TEMP_SUFFIX: &str = ".tmp";

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    public_base: Option<Url>,
}

impl FsObjectStore {
    /// Store objects under `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_base: None,
        }
    }

    /// Report object URLs relative to `base` instead of `file://` URLs.
    #[must_use]
    pub fn with_public_base_url(mut self, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        self.public_base = Some(base);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_key(key) {
            return Err(StorageError::InvalidPath {
                path: key.to_string(),
            });
        }
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str, full: &Path) -> String {
        if let Some(url) = self.public_base.as_ref().and_then(|b| b.join(key).ok()) {
            return url.into();
        }
        std::path::absolute(full)
            .ok()
            .and_then(|abs| Url::from_file_path(abs).ok())
            .map_or_else(|| full.display().to_string(), String::from)
    }
}

fn map_io(err: &io::Error, key: &str) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::not_found(key),
        io::ErrorKind::PermissionDenied => StorageError::Forbidden {
            path: key.to_string(),
        },
        _ => StorageError::backend(format!("{key}: {err}")),
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<StoredObject, StorageError> {
        let full = self.resolve(path)?;
        let parent = full.parent().unwrap_or(&self.root);
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| map_io(&e, path))?;

        let name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{name}.{}{TEMP_SUFFIX}", uuid::Uuid::new_v4().simple()));

        let size = bytes.len();
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| map_io(&e, path))?;
        if let Err(e) = tokio::fs::rename(&temp, &full).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(map_io(&e, path));
        }

        debug!(
            target: "narrate.storage",
            path,
            size,
            content_type = %options.content_type,
            "Stored object"
        );
        Ok(StoredObject {
            path: path.to_string(),
            url: self.url_for(path, &full),
        })
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| map_io(&e, path))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let trimmed = prefix.trim_end_matches('/');
        let start = if trimmed.is_empty() {
            self.root.clone()
        } else {
            let full = self.resolve(trimmed)?;
            if full.is_dir() {
                full
            } else {
                full.parent().map_or_else(|| self.root.clone(), Path::to_path_buf)
            }
        };

        let mut found = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(map_io(&e, prefix)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| map_io(&e, prefix))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| map_io(&e, prefix))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let is_temp = key.rsplit('/').next().is_some_and(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX));
                if !is_temp && key.starts_with(prefix) {
                    found.push(StoredObject {
                        url: self.url_for(&key, &path),
                        path: key,
                    });
                }
            }
        }
        Ok(found)
    }
}
