//! Distributed per-fingerprint computation lock.
//!
//! Built on the cache's atomic `set_nx`: the first acquirer writes a fresh
//! holder token under the lock key with a lease TTL. A heartbeat task renews
//! the lease while the holder is alive; release is a token-checked delete so
//! only the holder can free the lock. The lease TTL is the authoritative
//! safety net — if a holder crashes, the lock frees itself when the lease
//! expires.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    cache::{Cache, CacheError},
    config::LockConfig,
};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another request holds the lock")]
    Busy,

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Acquires fingerprint locks with a bounded wait and hands out leases.
#[derive(Clone)]
pub struct ConcurrencyGuard {
    cache: Arc<dyn Cache>,
    lease: Duration,
    heartbeat: Duration,
    acquire_wait: Duration,
    retry_interval: Duration,
}

impl ConcurrencyGuard {
    pub fn new(cache: Arc<dyn Cache>, config: &LockConfig) -> Self {
        Self {
            cache,
            lease: config.lease(),
            heartbeat: config.heartbeat(),
            acquire_wait: config.acquire_wait(),
            retry_interval: config.retry_interval(),
        }
    }

    /// Try to take the lock, retrying until `acquire_wait` elapses.
    ///
    /// Waiting out a short-lived holder is the common case for concurrent
    /// identical requests: the winner computes, the waiters acquire after it
    /// releases and find the result in cache.
    pub async fn acquire(&self, key: &str) -> Result<LockLease, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + self.acquire_wait;

        loop {
            if self
                .cache
                .set_nx(key, token.as_bytes(), self.lease)
                .await?
            {
                break;
            }
            if Instant::now() + self.retry_interval > deadline {
                return Err(LockError::Busy);
            }
            tokio::time::sleep(self.retry_interval).await;
        }

        Ok(LockLease::start(
            self.cache.clone(),
            key.to_string(),
            token,
            self.lease,
            self.heartbeat,
        ))
    }
}

/// A held lock. Renewed by heartbeat until released or dropped.
pub struct LockLease {
    cache: Arc<dyn Cache>,
    key: String,
    token: String,
    released: Arc<AtomicBool>,
    heartbeat: JoinHandle<()>,
}

impl LockLease {
    fn start(
        cache: Arc<dyn Cache>,
        key: String,
        token: String,
        lease: Duration,
        interval: Duration,
    ) -> Self {
        let released = Arc::new(AtomicBool::new(false));

        let heartbeat = {
            let cache = cache.clone();
            let key = key.clone();
            let token = token.clone();
            let released = released.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    if released.load(Ordering::SeqCst) {
                        return;
                    }
                    match cache.expire_if_match(&key, token.as_bytes(), lease).await {
                        Ok(true) => {}
                        Ok(false) => {
                            // Lease expired or changed hands; nothing left to renew.
                            tracing::warn!(key = %key, "lock lease lost before release");
                            return;
                        }
                        Err(e) => {
                            tracing::warn!(key = %key, error = %e, "lock heartbeat failed");
                        }
                    }
                }
            })
        };

        Self {
            cache,
            key,
            token,
            released,
            heartbeat,
        }
    }

    /// Release the lock. Best-effort: if the backend is unreachable the
    /// lease TTL will free the lock on its own.
    pub async fn release(&self) -> Result<(), CacheError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.heartbeat.abort();
        self.cache
            .delete_if_match(&self.key, self.token.as_bytes())
            .await?;
        Ok(())
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.heartbeat.abort();

        // Best-effort async release; the lease TTL covers the case where no
        // runtime is available to run it.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let cache = self.cache.clone();
            let key = std::mem::take(&mut self.key);
            let token = std::mem::take(&mut self.token);
            handle.spawn(async move {
                if let Err(e) = cache.delete_if_match(&key, token.as_bytes()).await {
                    tracing::warn!(key = %key, error = %e, "failed to release dropped lock");
                }
            });
        }
    }
}
