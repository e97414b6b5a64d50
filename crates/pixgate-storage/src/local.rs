//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::backend::{StorageBackend, validate_key};
use crate::error::StorageError;

/// Local disk storage backend
///
/// Stores cached bodies in a sharded directory structure:
/// `<base_path>/bodies/<first 2 chars>/<key>`
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();

        fs::create_dir_all(base_path.join("bodies")).await?;

        info!("Initialized local storage at {:?}", base_path);

        Ok(Self { base_path })
    }

    /// Get the file path for a cache key
    fn body_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;

        // Use first 2 characters for sharding
        let shard = &key[..2];
        Ok(self.base_path.join("bodies").join(shard).join(key))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.body_path(key)?;
        Ok(path.exists())
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.body_path(key)?;
        debug!("Reading body from {:?}", path);

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn write(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.body_path(key)?;
        debug!("Writing {} bytes to {:?}", data.len(), path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using a temp file, then rename over the target
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.body_path(key)?;
        debug!("Deleting body at {:?}", path);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
