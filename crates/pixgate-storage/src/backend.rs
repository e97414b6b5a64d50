//! Storage backend trait

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Storage backend trait
///
/// Implementations of this trait hold cached response bodies, addressed
/// by the hex cache key derived from the resource path. A `write` must
/// publish atomically: a concurrent `read` sees either the previous body
/// in full or the new body in full, never a truncated file.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Check if a body exists
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Read a body fully into memory
    async fn read(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Write a body, replacing any previous one atomically
    async fn write(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Delete a body
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Compute the cache key for a resource path: SHA-256 hex of the path.
///
/// The key doubles as a filename, so it must stay within `[0-9a-f]`.
pub fn cache_key(path: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate that a key looks like a SHA-256 hex digest before it is used
/// to build a filesystem path.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable_hex() {
        let key = cache_key("abc123.jpg");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("abc123.jpg"));
        assert_ne!(key, cache_key("abc124.jpg"));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key(&cache_key("x")).is_ok());
        assert!(validate_key("short").is_err());
        assert!(validate_key(&"A".repeat(64)).is_err());
        assert!(validate_key(&"../".repeat(22)).is_err());
    }
}
