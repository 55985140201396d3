//! Media storage backends.
//!
//! One capability trait with interchangeable implementations, chosen once at
//! startup by [`from_config`]. Storage keys are opaque to the rest of the
//! crate; only the backend that produced a key can turn it into a URL.

use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::config::{AppConfig, StorageDriver};

mod local;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use local::LocalStorage;

/// Upload body handed to a backend.
pub type Body<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid file name {0:?}")]
    InvalidFilename(String),
    #[error("storage driver {0:?} is not supported by this build")]
    Unsupported(&'static str),
    #[error("no free storage key left for {0:?}")]
    NameTaken(String),
}

/// How many suffixed variants of a file name are tried before giving up.
pub const MAX_NAME_ATTEMPTS: u32 = 100;

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Prepares the backend (creates directories, buckets, ...).
    async fn init(&self) -> Result<(), StorageError>;

    /// Stores a checkpoint attachment and returns its storage key. Never
    /// overwrites: a taken name is stored as `name-1.ext`, `name-2.ext`, ...
    async fn save_media(
        &self,
        journey: &str,
        checkpoint: &str,
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError>;

    /// Stores a user avatar and returns its storage key.
    async fn save_profile_pic(
        &self,
        user: &str,
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError>;

    fn public_url(&self, storage_key: &str) -> String;

    /// Removes a stored object. Missing keys are not an error.
    async fn delete(&self, storage_key: &str) -> Result<(), StorageError>;

    async fn health_check(&self) -> Result<(), StorageError>;
}

pub fn from_config(config: &AppConfig) -> Result<Arc<dyn MediaStorage>, StorageError> {
    match config.storage_driver {
        StorageDriver::Local => Ok(Arc::new(LocalStorage::new(
            &config.storage_path,
            &config.storage_public_prefix,
        ))),
        StorageDriver::S3 => Err(StorageError::Unsupported("s3")),
    }
}

/// Accepts only a single plain path component, so keys can never escape the
/// backend's namespace.
pub(crate) fn path_segment(name: &str) -> Result<&str, StorageError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(name),
        _ => Err(StorageError::InvalidFilename(name.to_string())),
    }
}

/// The name tried on the given attempt: the file name itself first, then with
/// `-<attempt>` inserted before the extension.
pub(crate) fn candidate_name(filename: &str, attempt: u32) -> String {
    if attempt == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{attempt}.{ext}"),
        _ => format!("{filename}-{attempt}"),
    }
}
