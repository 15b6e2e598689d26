use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage numbers for one user as reported by the quota ledger.
///
/// A user with no ledger rows gets all-zero values; absence of a record is
/// never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub today_count: i64,
    pub total_analyses: i64,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Subscription standing of a user. Subscribed and admin users bypass the
/// daily quota entirely: they are never counted and never rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionState {
    pub subscribed: bool,
    pub admin: bool,
}

impl SubscriptionState {
    pub fn bypasses_quota(&self) -> bool {
        self.subscribed || self.admin
    }
}

/// Quota standing returned by `GET /api/v1/quota`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub can_use_today: bool,
    pub today_count: i64,
    pub daily_limit: i64,
    pub total_analyses: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    /// When today's quota window rolls over (next UTC midnight).
    pub resets_at: DateTime<Utc>,
    pub subscribed: bool,
    pub admin: bool,
    /// True for subscribed/admin users, whose requests are never metered.
    pub unlimited: bool,
}
