use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{LedgerResult, QuotaLedger};
use crate::models::UsageInfo;

#[derive(Debug, Clone)]
struct UsageRow {
    count: i64,
    last_used_at: DateTime<Utc>,
    #[allow(dead_code)]
    profile: String,
}

/// In-memory ledger for development and tests. Counts reset on restart.
#[derive(Default)]
pub struct MemoryQuotaLedger {
    rows: DashMap<(Uuid, NaiveDate), UsageRow>,
}

impl MemoryQuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    async fn today_count(&self, user_id: Uuid, day: NaiveDate) -> LedgerResult<i64> {
        Ok(self
            .rows
            .get(&(user_id, day))
            .map(|row| row.count)
            .unwrap_or(0))
    }

    async fn record_usage(
        &self,
        user_id: Uuid,
        day: NaiveDate,
        profile: &str,
    ) -> LedgerResult<()> {
        let now = Utc::now();
        // Entry API keeps the increment atomic under concurrent writers
        self.rows
            .entry((user_id, day))
            .and_modify(|row| {
                row.count += 1;
                row.last_used_at = now;
                row.profile = profile.to_string();
            })
            .or_insert_with(|| UsageRow {
                count: 1,
                last_used_at: now,
                profile: profile.to_string(),
            });
        Ok(())
    }

    async fn usage_info(&self, user_id: Uuid, day: NaiveDate) -> LedgerResult<UsageInfo> {
        let mut info = UsageInfo::default();
        for entry in self.rows.iter() {
            let (owner, _) = entry.key();
            if *owner != user_id {
                continue;
            }
            info.total_analyses += entry.count;
            if info.last_used_at.is_none_or(|t| entry.last_used_at > t) {
                info.last_used_at = Some(entry.last_used_at);
            }
        }
        info.today_count = self.today_count(user_id, day).await?;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    #[tokio::test]
    async fn unknown_user_has_zero_count() {
        let ledger = MemoryQuotaLedger::new();
        assert_eq!(
            ledger.today_count(Uuid::new_v4(), day(26)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn record_usage_upserts() {
        let ledger = MemoryQuotaLedger::new();
        let user = Uuid::new_v4();

        ledger.record_usage(user, day(26), "khaby.lame").await.unwrap();
        assert_eq!(ledger.today_count(user, day(26)).await.unwrap(), 1);

        ledger.record_usage(user, day(26), "zachking").await.unwrap();
        assert_eq!(ledger.today_count(user, day(26)).await.unwrap(), 2);

        // A new day starts a new row
        assert_eq!(ledger.today_count(user, day(27)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn usage_info_sums_across_days() {
        let ledger = MemoryQuotaLedger::new();
        let user = Uuid::new_v4();

        ledger.record_usage(user, day(25), "a").await.unwrap();
        ledger.record_usage(user, day(26), "b").await.unwrap();
        ledger.record_usage(user, day(26), "c").await.unwrap();

        let info = ledger.usage_info(user, day(26)).await.unwrap();
        assert_eq!(info.today_count, 2);
        assert_eq!(info.total_analyses, 3);
        assert!(info.last_used_at.is_some());
    }

    #[tokio::test]
    async fn concurrent_records_never_lose_an_increment() {
        let ledger = std::sync::Arc::new(MemoryQuotaLedger::new());
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_usage(user, day(26), "p").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.today_count(user, day(26)).await.unwrap(), 16);
    }
}
