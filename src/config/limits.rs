use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ConfigError;

/// Quota, lock, and TTL settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Free analyses per user per UTC calendar day.
    #[serde(default = "default_daily_free_analyses")]
    pub daily_free_analyses: i64,

    /// Users with an active subscription: never metered.
    /// Stand-in for a billing-service lookup.
    #[serde(default)]
    pub subscribed_users: Vec<Uuid>,

    /// Admin users: never metered.
    #[serde(default)]
    pub admin_users: Vec<Uuid>,

    #[serde(default)]
    pub ttl: TtlConfig,

    #[serde(default)]
    pub lock: LockConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_free_analyses: default_daily_free_analyses(),
            subscribed_users: Vec::new(),
            admin_users: Vec::new(),
            ttl: TtlConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

impl LimitsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daily_free_analyses < 1 {
            return Err(ConfigError::Validation(
                "daily_free_analyses must be at least 1".into(),
            ));
        }
        self.lock.validate()
    }
}

fn default_daily_free_analyses() -> i64 {
    1
}

/// TTLs for the constituent data classes, in seconds.
///
/// The composed analysis result is cached for the shortest of the three:
/// the result must never outlive its most volatile part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtlConfig {
    #[serde(default = "default_profile_ttl")]
    pub profile_secs: u64,

    #[serde(default = "default_posts_ttl")]
    pub posts_secs: u64,

    #[serde(default = "default_trends_ttl")]
    pub trends_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            profile_secs: default_profile_ttl(),
            posts_secs: default_posts_ttl(),
            trends_secs: default_trends_ttl(),
        }
    }
}

impl TtlConfig {
    /// TTL for a composed analysis result: the shortest constituent TTL.
    pub fn result_ttl(&self) -> Duration {
        let secs = self
            .profile_secs
            .min(self.posts_secs)
            .min(self.trends_secs);
        Duration::from_secs(secs)
    }
}

fn default_profile_ttl() -> u64 {
    1800 // 30 min
}

fn default_posts_ttl() -> u64 {
    900 // 15 min
}

fn default_trends_ttl() -> u64 {
    300 // 5 min
}

/// Per-fingerprint computation lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// Lease TTL in seconds. If a holder crashes, the lock frees itself
    /// after this long; live holders renew via heartbeat.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    /// Heartbeat renewal interval in seconds. Must be shorter than the
    /// lease TTL.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// How long an acquirer waits for a busy lock before giving up,
    /// in milliseconds.
    #[serde(default = "default_acquire_wait_ms")]
    pub acquire_wait_ms: u64,

    /// Interval between acquisition attempts, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_secs: default_lease_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            acquire_wait_ms: default_acquire_wait_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl LockConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_secs >= self.lease_secs {
            return Err(ConfigError::Validation(
                "lock heartbeat_secs must be shorter than lease_secs".into(),
            ));
        }
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "lock retry_interval_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn acquire_wait(&self) -> Duration {
        Duration::from_millis(self.acquire_wait_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

fn default_lease_secs() -> u64 {
    120
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_acquire_wait_ms() -> u64 {
    15_000
}

fn default_retry_interval_ms() -> u64 {
    250
}
