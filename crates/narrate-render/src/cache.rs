//! Content-addressed chunk audio cache.
//!
//! Entries live at `cache/chunks/{hash}.wav` and are shared by every job.
//! A hash fully determines its audio, so duplicate stores simply overwrite
//! identical bytes and concurrent writers need no coordination.

use std::sync::Arc;

use narrate_audio::PcmBuffer;
use narrate_core::paths::chunk_cache_path;
use narrate_core::{ObjectStore, PutOptions, RetryPolicy, StorageError, StoredObject};
use tracing::{debug, warn};

use crate::fetcher::RetryableFetcher;

/// Global cache of synthesized chunk audio keyed by content hash.
#[derive(Clone)]
pub struct ChunkCache {
    store: Arc<dyn ObjectStore>,
    fetcher: RetryableFetcher,
    policy: RetryPolicy,
}

impl ChunkCache {
    /// Cache over `store`, probing with `policy` (normally the opportunistic one).
    pub fn new(store: Arc<dyn ObjectStore>, policy: RetryPolicy) -> Self {
        Self {
            fetcher: RetryableFetcher::new(Arc::clone(&store)),
            store,
            policy,
        }
    }

    /// Cached audio for `hash`, or `None` on a miss.
    ///
    /// Never fails: an object that stays invisible for the whole retry
    /// budget is a miss, and a storage fault is logged and treated as one.
    /// An entry that does not decode as WAV is also a miss, so the chunk is
    /// synthesized again and the entry overwritten.
    pub async fn lookup(&self, hash: &str) -> Option<Vec<u8>> {
        let path = chunk_cache_path(hash);
        match self.fetcher.fetch_optional(&path, &self.policy).await {
            Ok(Some(bytes)) if !bytes.is_empty() => match PcmBuffer::from_wav(&bytes) {
                Ok(_) => {
                    debug!(target: "narrate.cache", hash, size = bytes.len(), "Cache hit");
                    Some(bytes)
                }
                Err(e) => {
                    warn!(target: "narrate.cache", hash, error = %e, "Unreadable cache entry, treating as miss");
                    None
                }
            },
            Ok(_) => {
                debug!(target: "narrate.cache", hash, "Cache miss");
                None
            }
            Err(e) => {
                warn!(target: "narrate.cache", hash, error = %e, "Cache probe failed, treating as miss");
                None
            }
        }
    }

    /// Store audio for `hash`. Overwrites any existing entry.
    pub async fn store(&self, hash: &str, audio: Vec<u8>) -> Result<StoredObject, StorageError> {
        let path = chunk_cache_path(hash);
        let size = audio.len();
        let stored = self
            .store
            .put(&path, audio, PutOptions::private("audio/wav"))
            .await?;
        debug!(target: "narrate.cache", hash, size, "Cached chunk audio");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use narrate_storage::MemoryObjectStore;

    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::opportunistic().with_delays(Duration::from_millis(1), Duration::from_millis(1))
    }

    fn wav(millis: u64) -> Vec<u8> {
        PcmBuffer::silence(Duration::from_millis(millis), 16_000, 1)
            .unwrap()
            .to_wav()
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let store = Arc::new(MemoryObjectStore::new());
        let cache = ChunkCache::new(store.clone(), policy());

        assert_eq!(cache.lookup("abc123").await, None);
        cache.store("abc123", wav(100)).await.unwrap();
        assert_eq!(cache.lookup("abc123").await, Some(wav(100)));
        assert!(store.contains("cache/chunks/abc123.wav").await);
    }

    #[tokio::test]
    async fn test_duplicate_store_is_idempotent() {
        let store = Arc::new(MemoryObjectStore::new());
        let cache = ChunkCache::new(store.clone(), policy());
        cache.store("h", wav(50)).await.unwrap();
        cache.store("h", wav(50)).await.unwrap();
        assert_eq!(cache.lookup("h").await, Some(wav(50)));
        assert_eq!(store.put_count("cache/chunks/h.wav").await, 2);
    }

    #[tokio::test]
    async fn test_entry_invisible_past_budget_is_a_miss() {
        let store = Arc::new(MemoryObjectStore::new().with_read_lag(3));
        let cache = ChunkCache::new(store, policy());
        cache.store("slow", wav(20)).await.unwrap();
        // Two probes, both hidden.
        assert_eq!(cache.lookup("slow").await, None);
        // Third hidden read consumed here; the fourth sees the object.
        assert_eq!(cache.lookup("slow").await, Some(wav(20)));
    }

    #[tokio::test]
    async fn test_cache_is_shared_across_handles() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let a = ChunkCache::new(Arc::clone(&store), policy());
        let b = ChunkCache::new(store, policy());
        a.store("shared", wav(30)).await.unwrap();
        assert_eq!(b.lookup("shared").await, Some(wav(30)));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryObjectStore::new());
        let cache = ChunkCache::new(store.clone(), policy());
        cache.store("broken", b"not a wav".to_vec()).await.unwrap();
        assert!(store.contains("cache/chunks/broken.wav").await);
        assert_eq!(cache.lookup("broken").await, None);

        // A fresh store over the same hash repairs the entry.
        cache.store("broken", wav(40)).await.unwrap();
        assert_eq!(cache.lookup("broken").await, Some(wav(40)));
    }
}
