mod error;
mod keys;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod traits;

use std::sync::Arc;

pub use error::{CacheError, CacheResult};
pub use keys::CacheKeys;
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis::RedisCache;
pub use traits::{Cache, CacheExt};

use crate::config::CacheConfig;

/// Build the cache backend selected by configuration.
pub async fn build(config: &CacheConfig) -> CacheResult<Arc<dyn Cache>> {
    match config {
        CacheConfig::Memory(c) => Ok(Arc::new(MemoryCache::new(c))),
        #[cfg(feature = "redis")]
        CacheConfig::Redis(c) => Ok(Arc::new(RedisCache::connect(c).await?)),
        #[cfg(not(feature = "redis"))]
        CacheConfig::Redis(_) => Err(CacheError::Internal(
            "redis cache configured but the binary was built without the `redis` feature".into(),
        )),
    }
}
