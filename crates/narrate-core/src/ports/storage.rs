//! Object storage port.

use async_trait::async_trait;
use thiserror::Error;

/// Visibility of a stored object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Access {
    #[default]
    Private,
    Public,
}

/// Metadata attached to a `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    pub access: Access,
}

impl PutOptions {
    /// Private object with the given content type.
    pub fn private(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            access: Access::Private,
        }
    }

    /// Publicly readable object with the given content type.
    pub fn public(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            access: Access::Public,
        }
    }

    /// JSON document.
    #[must_use]
    pub fn json() -> Self {
        Self::private("application/json")
    }
}

/// A stored object reference returned by `put` and `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

/// Errors from object storage.
///
/// `NotFound`, `Forbidden` and `Transport` can all be symptoms of an
/// eventually-consistent backend and are the only retryable kinds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Object not found: {path}")]
    NotFound { path: String },

    #[error("Access denied: {path}")]
    Forbidden { path: String },

    #[error("Storage transport error: {message}")]
    Transport { message: String },

    #[error("Invalid storage path: {path}")]
    InvalidPath { path: String },

    #[error("Storage backend error: {message}")]
    Backend { message: String },
}

impl StorageError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Forbidden { .. } | Self::Transport { .. }
        )
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Key/value object store used for every persisted artifact.
///
/// Implementations may be eventually consistent: a `get` right after a
/// `put` of the same key can report `NotFound`. Callers that need
/// read-after-write go through the retrying fetcher.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (or overwrite) an object.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<StoredObject, StorageError>;

    /// Read an object.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// List objects under a prefix. Order is unspecified.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;
}
