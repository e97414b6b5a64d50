//! In-memory storage backend
//!
//! Keeps bodies in a process-local map. Used by tests and by deployments
//! that do not want the cache to touch disk at all.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::backend::{StorageBackend, validate_key};
use crate::error::StorageError;

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryStorage {
    bodies: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.bodies.read().contains_key(key))
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        validate_key(key)?;
        self.bodies
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        validate_key(key)?;
        // Bytes is published under the lock in one step, so readers see
        // either the old body or the new one, never a partial write.
        self.bodies.write().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.bodies.write().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::cache_key;

    #[tokio::test]
    async fn test_round_trip() {
        let storage = MemoryStorage::new();
        let key = cache_key("a/b.jpg");

        storage.write(&key, Bytes::from_static(b"jpeg")).await.unwrap();
        assert_eq!(storage.read(&key).await.unwrap(), Bytes::from_static(b"jpeg"));

        assert!(storage.delete(&key).await.unwrap());
        assert!(matches!(
            storage.read(&key).await.unwrap_err(),
            StorageError::NotFound(_)
        ));
    }
}
