use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use super::{candidate_name, path_segment, Body, MediaStorage, StorageError, MAX_NAME_ATTEMPTS};

/// Stores files under a local directory:
///
/// ```text
/// <root>/journeys/<journey>/checkpoints/<checkpoint>/<file>
/// <root>/users/<user>/<file>
/// ```
///
/// Keys are the root-relative path with `/` separators; URLs are the key
/// appended to a static-files prefix.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalStorage {
    pub fn new(root: &str, public_prefix: &str) -> Self {
        let root = if root.is_empty() { "./uploads" } else { root };
        Self {
            root: PathBuf::from(root),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Writes `body` under `dir` using the first free variant of `filename`.
    /// Existing files are never opened for writing.
    async fn write(
        &self,
        dir: &[&str],
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError> {
        let dir_path = dir.iter().fold(self.root.clone(), |p, s| p.join(s));
        fs::create_dir_all(&dir_path).await?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = candidate_name(filename, attempt);
            let path = dir_path.join(&name);
            let mut out = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            let key = format!("{}/{}", dir.join("/"), name);
            let written = match tokio::io::copy(body, &mut out).await {
                Ok(n) => n,
                Err(e) => {
                    drop(out);
                    let _ = fs::remove_file(&path).await;
                    return Err(e.into());
                }
            };
            out.sync_all().await?;
            debug!("Stored {} bytes at {}", written, key);
            return Ok(key);
        }
        Err(StorageError::NameTaken(filename.to_string()))
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    async fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        info!("Local storage ready at {}", self.root.display());
        Ok(())
    }

    async fn save_media(
        &self,
        journey: &str,
        checkpoint: &str,
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError> {
        let dir = [
            "journeys",
            path_segment(journey)?,
            "checkpoints",
            path_segment(checkpoint)?,
        ];
        self.write(&dir, path_segment(filename)?, body).await
    }

    async fn save_profile_pic(
        &self,
        user: &str,
        filename: &str,
        body: Body<'_>,
    ) -> Result<String, StorageError> {
        self.write(&["users", path_segment(user)?], path_segment(filename)?, body)
            .await
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.public_prefix, storage_key)
    }

    async fn delete(&self, storage_key: &str) -> Result<(), StorageError> {
        let mut path = self.root.clone();
        for segment in storage_key.split('/') {
            path.push(path_segment(segment)?);
        }
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {}", storage_key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let meta = fs::metadata(&self.root).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_media_under_journey_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap(), "/static/");
        storage.init().await.unwrap();
        storage.health_check().await.unwrap();

        let mut body: &[u8] = b"jpeg bytes";
        let key = storage
            .save_media("jTok", "cTok", "original.jpg", &mut body)
            .await
            .unwrap();

        assert_eq!(key, "journeys/jTok/checkpoints/cTok/original.jpg");
        let stored = std::fs::read(dir.path().join(&key)).unwrap();
        assert_eq!(stored, b"jpeg bytes");
        assert_eq!(
            storage.public_url(&key),
            "/static/journeys/jTok/checkpoints/cTok/original.jpg"
        );
    }

    #[tokio::test]
    async fn same_name_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap(), "/static");

        let mut first: &[u8] = b"FIRST";
        let mut second: &[u8] = b"SECOND";
        let k1 = storage
            .save_media("jTok", "cTok", "a.jpg", &mut first)
            .await
            .unwrap();
        let k2 = storage
            .save_media("jTok", "cTok", "a.jpg", &mut second)
            .await
            .unwrap();

        assert_eq!(k1, "journeys/jTok/checkpoints/cTok/a.jpg");
        assert_eq!(k2, "journeys/jTok/checkpoints/cTok/a-1.jpg");
        assert_eq!(std::fs::read(dir.path().join(&k1)).unwrap(), b"FIRST");
        assert_eq!(std::fs::read(dir.path().join(&k2)).unwrap(), b"SECOND");
    }

    #[tokio::test]
    async fn delete_removes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap(), "/static");
        let mut body: &[u8] = b"x";
        let key = storage
            .save_profile_pic("uTok", "me.png", &mut body)
            .await
            .unwrap();

        storage.delete(&key).await.unwrap();
        assert!(!dir.path().join(&key).exists());
        storage.delete(&key).await.unwrap();
        assert!(matches!(
            storage.delete("users/../../etc/passwd").await,
            Err(StorageError::InvalidFilename(_))
        ));
    }

    #[tokio::test]
    async fn profile_pic_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap(), "/static");
        let mut body: &[u8] = b"x";
        let err = storage
            .save_profile_pic("uTok", "../../escape.png", &mut body)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidFilename(_)));
    }

    #[tokio::test]
    async fn health_check_fails_for_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let storage = LocalStorage::new(missing.to_str().unwrap(), "/static");
        assert!(storage.health_check().await.is_err());
    }
}
