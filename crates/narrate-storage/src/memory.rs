//! In-memory object store.
//!
//! Used by tests and by `--bypass-engine` dry runs. It can simulate an
//! eventually-consistent backend: with a read lag of `n`, the first `n`
//! reads of a freshly written key report `NotFound`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use narrate_core::paths::is_safe_key;
use narrate_core::{Access, ObjectStore, PutOptions, StorageError, StoredObject};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    content_type: String,
    access: Access,
    /// Reads that still report `NotFound`.
    hidden_reads: u32,
}

/// Object store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Entry>>,
    read_lag: u32,
    put_counts: RwLock<HashMap<String, u32>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide each newly written object from the next `reads` reads.
    #[must_use]
    pub fn with_read_lag(mut self, reads: u32) -> Self {
        self.read_lag = reads;
        self
    }

    fn url_for(path: &str) -> String {
        format!("memory://{path}")
    }

    /// Whether an object exists, ignoring read lag.
    pub async fn contains(&self, path: &str) -> bool {
        self.objects.read().await.contains_key(path)
    }

    /// All keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Content type recorded for an object.
    pub async fn content_type(&self, path: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|e| e.content_type.clone())
    }

    /// Access recorded for an object.
    pub async fn access(&self, path: &str) -> Option<Access> {
        self.objects.read().await.get(path).map(|e| e.access)
    }

    /// How many times `path` has been written.
    pub async fn put_count(&self, path: &str) -> u32 {
        self.put_counts.read().await.get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<StoredObject, StorageError> {
        if !is_safe_key(path) {
            return Err(StorageError::InvalidPath {
                path: path.to_string(),
            });
        }
        self.objects.write().await.insert(
            path.to_string(),
            Entry {
                bytes,
                content_type: options.content_type,
                access: options.access,
                hidden_reads: self.read_lag,
            },
        );
        *self
            .put_counts
            .write()
            .await
            .entry(path.to_string())
            .or_default() += 1;
        Ok(StoredObject {
            path: path.to_string(),
            url: Self::url_for(path),
        })
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let mut objects = self.objects.write().await;
        let Some(entry) = objects.get_mut(path) else {
            return Err(StorageError::not_found(path));
        };
        if entry.hidden_reads > 0 {
            entry.hidden_reads -= 1;
            return Err(StorageError::not_found(path));
        }
        Ok(entry.bytes.clone())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(|k| StoredObject {
                path: k.clone(),
                url: Self::url_for(k),
            })
            .collect())
    }
}
