use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::MultiplexedConnection};

use super::{
    error::{CacheError, CacheResult},
    traits::Cache,
};
use crate::config::RedisCacheConfig;

/// Compare-and-delete: remove the key only when it still holds the caller's
/// value. GET+DEL would race with a lease expiring and being re-acquired.
const DELETE_IF_MATCH: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Compare-and-expire: renew the key's TTL only when it still holds the
/// caller's value.
const EXPIRE_IF_MATCH: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Redis-backed cache. Shared across nodes, which is what makes the
/// computation lock and result dedup hold fleet-wide.
pub struct RedisCache {
    conn: MultiplexedConnection,
    delete_if_match: Script,
    expire_if_match: Script,
}

impl RedisCache {
    pub async fn connect(config: &RedisCacheConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let connect = client.get_multiplexed_async_connection();
        let conn = tokio::time::timeout(Duration::from_secs(config.connect_timeout_secs), connect)
            .await
            .map_err(|_| {
                CacheError::Internal(format!(
                    "redis connection timed out after {}s",
                    config.connect_timeout_secs
                ))
            })??;

        tracing::info!(url = %config.url, "connected to redis");

        Ok(Self {
            conn,
            delete_if_match: Script::new(DELETE_IF_MATCH),
            expire_if_match: Script::new(EXPIRE_IF_MATCH),
        })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn();
        let () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn();
        // SET NX PX returns OK when set, nil when the key already exists
        let response: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(response.is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn delete_if_match(&self, key: &str, expected: &[u8]) -> CacheResult<bool> {
        let mut conn = self.conn();
        let deleted: i64 = self
            .delete_if_match
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn expire_if_match(
        &self,
        key: &str,
        expected: &[u8],
        ttl: Duration,
    ) -> CacheResult<bool> {
        let mut conn = self.conn();
        let renewed: i64 = self
            .expire_if_match
            .key(key)
            .arg(expected)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;
        Ok(renewed == 1)
    }
}
