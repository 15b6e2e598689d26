use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use uuid::Uuid;

use super::{LedgerError, LedgerResult, QuotaLedger};
use crate::{config::SqliteConfig, models::UsageInfo};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS daily_usage (
    user_id          TEXT    NOT NULL,
    usage_date       TEXT    NOT NULL,
    analysis_count   INTEGER NOT NULL DEFAULT 0,
    last_analysis_at TEXT,
    profile_analyzed TEXT,
    PRIMARY KEY (user_id, usage_date)
)
"#;

pub struct SqliteQuotaLedger {
    pool: SqlitePool,
}

impl SqliteQuotaLedger {
    pub async fn connect(config: &SqliteConfig) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(|e| LedgerError::Internal(format!("invalid sqlite path: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!(path = %config.path, "sqlite quota ledger ready");

        Ok(Self { pool })
    }

    fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
        value
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

#[async_trait]
impl QuotaLedger for SqliteQuotaLedger {
    async fn today_count(&self, user_id: Uuid, day: NaiveDate) -> LedgerResult<i64> {
        let row = sqlx::query(
            "SELECT analysis_count FROM daily_usage WHERE user_id = ?1 AND usage_date = ?2",
        )
        .bind(user_id.to_string())
        .bind(day.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<i64, _>("analysis_count")).unwrap_or(0))
    }

    async fn record_usage(
        &self,
        user_id: Uuid,
        day: NaiveDate,
        profile: &str,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_usage (user_id, usage_date, analysis_count, last_analysis_at, profile_analyzed)
            VALUES (?1, ?2, 1, ?3, ?4)
            ON CONFLICT (user_id, usage_date)
            DO UPDATE SET
                analysis_count = analysis_count + 1,
                last_analysis_at = excluded.last_analysis_at,
                profile_analyzed = excluded.profile_analyzed
            "#,
        )
        .bind(user_id.to_string())
        .bind(day.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(profile)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn usage_info(&self, user_id: Uuid, day: NaiveDate) -> LedgerResult<UsageInfo> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE((SELECT analysis_count FROM daily_usage
                          WHERE user_id = ?1 AND usage_date = ?2), 0) AS today_count,
                COALESCE((SELECT SUM(analysis_count) FROM daily_usage
                          WHERE user_id = ?1), 0) AS total_analyses,
                (SELECT MAX(last_analysis_at) FROM daily_usage
                 WHERE user_id = ?1) AS last_used_at
            "#,
        )
        .bind(user_id.to_string())
        .bind(day.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(UsageInfo {
            today_count: row.get("today_count"),
            total_analyses: row.get("total_analyses"),
            last_used_at: Self::parse_timestamp(row.get("last_used_at")),
        })
    }
}
