use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;

#[async_trait]
pub trait Cache: Send + Sync {
    /// Get raw bytes from cache.
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set raw bytes in cache with TTL.
    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Set raw bytes only if the key doesn't exist (atomic set-if-not-exists).
    /// Returns true if the value was set, false if the key already exists.
    /// This is the primitive the computation lock is built on.
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool>;

    /// Delete a value from cache.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete a key only if its current value equals `expected`.
    /// Returns true if the key was deleted. Used for token-checked lock
    /// release: only the holder's token removes the lock.
    async fn delete_if_match(&self, key: &str, expected: &[u8]) -> CacheResult<bool>;

    /// Reset a key's TTL only if its current value equals `expected`.
    /// Returns true if the expiry was updated. Used for lease renewal: a
    /// heartbeat never extends a lock that has changed hands.
    async fn expire_if_match(&self, key: &str, expected: &[u8], ttl: Duration)
    -> CacheResult<bool>;
}

// Helper extension trait for working with JSON
pub trait CacheExt: Cache {
    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        use super::error::CacheError;
        match self.get_bytes(key).await? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| CacheError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        use super::error::CacheError;
        let bytes =
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_bytes(key, &bytes, ttl).await
    }
}

// Blanket implementation for all Cache types
impl<T: Cache + ?Sized> CacheExt for T {}
