//! Request coordinator: the single entry point for analysis requests.
//!
//! Order of operations for a submit:
//!   1. normalize the profile input and derive the request fingerprint;
//!   2. cache fast path — a hit is served immediately and never metered;
//!   3. quota pre-check for metered users;
//!   4. take the per-fingerprint computation lock (bounded wait);
//!   5. re-check the cache under the lock — waiters land here and find the
//!      winner's result;
//!   6. run the pipeline, store the result, then charge the quota.
//!
//! Storing before charging keeps the failure mode cheap: a crash between
//! the two leaves an uncharged cached result, never a charge with nothing
//! to show for it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use super::{AnalysisError, SubscriptionStore};
use crate::{
    cache::{Cache, CacheExt, CacheKeys},
    ledger::QuotaLedger,
    lock::{ConcurrencyGuard, LockError},
    models::{AnalysisResult, QuotaStatus},
    normalize,
    pipeline::{AnalysisPipeline, ProgressReporter},
};

#[derive(Debug)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// True when the result came from cache rather than a fresh computation.
    pub cache_hit: bool,
}

pub struct RequestCoordinator {
    cache: Arc<dyn Cache>,
    ledger: Arc<dyn QuotaLedger>,
    subscriptions: Arc<dyn SubscriptionStore>,
    guard: ConcurrencyGuard,
    pipeline: Arc<AnalysisPipeline>,
    daily_limit: i64,
    result_ttl: Duration,
}

impl RequestCoordinator {
    pub fn new(
        cache: Arc<dyn Cache>,
        ledger: Arc<dyn QuotaLedger>,
        subscriptions: Arc<dyn SubscriptionStore>,
        guard: ConcurrencyGuard,
        pipeline: Arc<AnalysisPipeline>,
        daily_limit: i64,
        result_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            ledger,
            subscriptions,
            guard,
            pipeline,
            daily_limit,
            result_ttl,
        }
    }

    #[tracing::instrument(name = "coordinator.submit", skip(self, profile_input, progress))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        profile_input: &str,
        progress: &ProgressReporter,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let username = normalize::normalize_profile_input(profile_input)
            .map_err(|e| AnalysisError::Validation(e.to_string()))?;
        let day = Utc::now().date_naive();
        let fingerprint = CacheKeys::request_fingerprint(user_id, &username, day);
        let result_key = CacheKeys::analysis(&fingerprint);

        // Fast path. A repeat of a request the user already paid for today
        // is free, even when today's quota is spent.
        if let Some(result) = self.cache.get_json::<AnalysisResult>(&result_key).await? {
            tracing::info!(username = %username, "serving cached analysis");
            progress.complete("analysis ready");
            return Ok(AnalysisOutcome {
                result,
                cache_hit: true,
            });
        }

        let subscription = self.subscriptions.state(user_id).await;
        let metered = !subscription.bypasses_quota();
        if metered {
            let used = self.ledger.today_count(user_id, day).await?;
            if used >= self.daily_limit {
                return Err(AnalysisError::QuotaExceeded {
                    resets_at: next_utc_midnight(day),
                });
            }
        }

        let lease = match self.guard.acquire(&CacheKeys::lock(&fingerprint)).await {
            Ok(lease) => lease,
            Err(LockError::Busy) => return Err(AnalysisError::InProgress),
            Err(LockError::Cache(e)) => return Err(e.into()),
        };

        // Waiters that outlasted the winner's computation land here and
        // take the winner's result without charging or recomputing.
        if let Some(result) = self.cache.get_json::<AnalysisResult>(&result_key).await? {
            release_quietly(&lease).await;
            progress.complete("analysis ready");
            return Ok(AnalysisOutcome {
                result,
                cache_hit: true,
            });
        }

        let result = match self.pipeline.run(&username, progress).await {
            Ok(result) => result,
            Err(e) => {
                release_quietly(&lease).await;
                return Err(e.into());
            }
        };

        self.cache
            .set_json(&result_key, &result, self.result_ttl)
            .await?;
        if metered {
            self.ledger.record_usage(user_id, day, &username).await?;
        }
        release_quietly(&lease).await;

        Ok(AnalysisOutcome {
            result,
            cache_hit: false,
        })
    }

    #[tracing::instrument(name = "coordinator.quota_status", skip(self))]
    pub async fn quota_status(&self, user_id: Uuid) -> Result<QuotaStatus, AnalysisError> {
        let day = Utc::now().date_naive();
        let subscription = self.subscriptions.state(user_id).await;
        let usage = self.ledger.usage_info(user_id, day).await?;
        let unlimited = subscription.bypasses_quota();

        Ok(QuotaStatus {
            can_use_today: unlimited || usage.today_count < self.daily_limit,
            today_count: usage.today_count,
            daily_limit: self.daily_limit,
            total_analyses: usage.total_analyses,
            last_used_at: usage.last_used_at,
            resets_at: next_utc_midnight(day),
            subscribed: subscription.subscribed,
            admin: subscription.admin,
            unlimited,
        })
    }
}

/// Release is best-effort: the lease TTL frees a lock the backend lost.
async fn release_quietly(lease: &crate::lock::LockLease) {
    if let Err(e) = lease.release().await {
        tracing::warn!(error = %e, "failed to release computation lock");
    }
}

/// When the current quota window rolls over.
fn next_utc_midnight(day: NaiveDate) -> DateTime<Utc> {
    day.succ_opt()
        .unwrap_or(day)
        .and_time(NaiveTime::MIN)
        .and_utc()
}
