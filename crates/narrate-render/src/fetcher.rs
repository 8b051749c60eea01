//! Storage reads with retry and backoff.
//!
//! Object stores may not expose a just-written object immediately. Reads
//! that fail with a retryable [`StorageError`] (not found, forbidden,
//! transport) are retried with exponential backoff; anything else is
//! permanent and returned at once.

use std::sync::Arc;
use std::time::Duration;

use narrate_core::{ObjectStore, RetryPolicy, StorageError};
use rand::Rng;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Failure of a retried read.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Gave up reading {path} after {attempts} attempts")]
    Exhausted {
        path: String,
        attempts: u32,
        #[source]
        last: StorageError,
    },

    #[error("Reading {path} failed")]
    Permanent {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid JSON in {path}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Whether every attempt reported the object as missing.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Exhausted { last, .. } if last.is_not_found())
    }

    /// The storage error behind this failure, if any.
    pub const fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Permanent { source, .. } => Some(source),
            Self::Decode { .. } => None,
        }
    }
}

/// Retrying reader over an [`ObjectStore`].
#[derive(Clone)]
pub struct RetryableFetcher {
    store: Arc<dyn ObjectStore>,
}

impl RetryableFetcher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Read `path`, retrying per `policy`.
    pub async fn fetch(&self, path: &str, policy: &RetryPolicy) -> Result<Vec<u8>, FetchError> {
        let attempts = policy.attempts();
        let mut attempt = 1;
        loop {
            match self.store.get(path).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        debug!(target: "narrate.fetch", path, attempt, "Read succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e) if !e.is_retryable() => {
                    return Err(FetchError::Permanent {
                        path: path.to_string(),
                        source: e,
                    });
                }
                Err(e) if attempt >= attempts => {
                    return Err(FetchError::Exhausted {
                        path: path.to_string(),
                        attempts,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = jittered(policy.backoff_for(attempt), policy.jitter);
                    debug!(
                        target: "narrate.fetch",
                        path,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Read failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`fetch`](Self::fetch) but an object that never appeared is `None`.
    pub async fn fetch_optional(
        &self,
        path: &str,
        policy: &RetryPolicy,
    ) -> Result<Option<Vec<u8>>, FetchError> {
        match self.fetch(path, policy).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read and deserialize a JSON document.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        policy: &RetryPolicy,
    ) -> Result<T, FetchError> {
        let bytes = self.fetch(path, policy).await?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

/// Add up to 50% random extra delay when `jitter` is set.
fn jittered(delay: Duration, jitter: bool) -> Duration {
    let max_extra = delay.as_millis() as u64 / 2;
    if !jitter || max_extra == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_extra))
}
