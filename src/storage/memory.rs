//! In-memory storage double.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::{candidate_name, path_segment, Body, MediaStorage, StorageError, MAX_NAME_ATTEMPTS};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with an io error.
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn put(
        &self,
        dir: String,
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes).await?;
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let key = format!("{dir}/{}", candidate_name(filename, attempt));
            if let Entry::Vacant(slot) = files.entry(key.clone()) {
                slot.insert(bytes);
                return Ok(key);
            }
        }
        Err(StorageError::NameTaken(filename.to_string()))
    }
}

#[async_trait]
impl MediaStorage for MemoryStorage {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save_media(
        &self,
        journey: &str,
        checkpoint: &str,
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError> {
        let dir = format!(
            "journeys/{}/checkpoints/{}",
            path_segment(journey)?,
            path_segment(checkpoint)?
        );
        self.put(dir, path_segment(filename)?, body).await
    }

    async fn save_profile_pic(
        &self,
        user: &str,
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError> {
        let dir = format!("users/{}", path_segment(user)?);
        self.put(dir, path_segment(filename)?, body).await
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("https://cdn.test/{storage_key}")
    }

    async fn delete(&self, storage_key: &str) -> Result<(), StorageError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(storage_key);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
