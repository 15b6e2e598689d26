//! Per-user daily usage ledger.
//!
//! One row per (user, UTC calendar day). Recording usage is a single atomic
//! UPSERT — insert a fresh row at count 1 or increment the existing one — so
//! concurrent writers can never lose an increment. A user with no row for a
//! day simply has a count of zero; absence is never an error.

mod memory;
#[cfg(feature = "database-postgres")]
mod postgres;
#[cfg(feature = "database-sqlite")]
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
pub use memory::MemoryQuotaLedger;
#[cfg(feature = "database-postgres")]
pub use postgres::PostgresQuotaLedger;
#[cfg(feature = "database-sqlite")]
pub use sqlite::SqliteQuotaLedger;
use thiserror::Error;
use uuid::Uuid;

use crate::{config::DatabaseConfig, models::UsageInfo};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger backend `{0}` configured but not compiled in")]
    NotCompiled(&'static str),

    #[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Number of analyses the user has consumed on `day`.
    /// A user with no ledger row returns 0.
    async fn today_count(&self, user_id: Uuid, day: NaiveDate) -> LedgerResult<i64>;

    /// Record one consumed analysis: insert a row at count 1 or atomically
    /// increment the existing (user, day) row.
    async fn record_usage(&self, user_id: Uuid, day: NaiveDate, profile: &str)
    -> LedgerResult<()>;

    /// Usage summary for quota reporting: today's count, lifetime total,
    /// and the most recent usage timestamp.
    async fn usage_info(&self, user_id: Uuid, day: NaiveDate) -> LedgerResult<UsageInfo>;
}

/// Build the ledger backend selected by configuration.
pub async fn build(config: &DatabaseConfig) -> LedgerResult<Arc<dyn QuotaLedger>> {
    match config {
        DatabaseConfig::None => {
            tracing::warn!("no database configured; usage counts reset on restart");
            Ok(Arc::new(MemoryQuotaLedger::new()))
        }
        #[cfg(feature = "database-sqlite")]
        DatabaseConfig::Sqlite(c) => Ok(Arc::new(SqliteQuotaLedger::connect(c).await?)),
        #[cfg(not(feature = "database-sqlite"))]
        DatabaseConfig::Sqlite(_) => Err(LedgerError::NotCompiled("database-sqlite")),
        #[cfg(feature = "database-postgres")]
        DatabaseConfig::Postgres(c) => Ok(Arc::new(PostgresQuotaLedger::connect(c).await?)),
        #[cfg(not(feature = "database-postgres"))]
        DatabaseConfig::Postgres(_) => Err(LedgerError::NotCompiled("database-postgres")),
    }
}
