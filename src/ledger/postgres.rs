use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use uuid::Uuid;

use super::{LedgerResult, QuotaLedger};
use crate::{config::PostgresConfig, models::UsageInfo};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS daily_usage (
    user_id          UUID        NOT NULL,
    usage_date       DATE        NOT NULL,
    analysis_count   BIGINT      NOT NULL DEFAULT 0,
    last_analysis_at TIMESTAMPTZ,
    profile_analyzed TEXT,
    PRIMARY KEY (user_id, usage_date)
)
"#;

pub struct PostgresQuotaLedger {
    pool: PgPool,
}

impl PostgresQuotaLedger {
    pub async fn connect(config: &PostgresConfig) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!("postgres quota ledger ready");

        Ok(Self { pool })
    }
}

#[async_trait]
impl QuotaLedger for PostgresQuotaLedger {
    async fn today_count(&self, user_id: Uuid, day: NaiveDate) -> LedgerResult<i64> {
        let row = sqlx::query(
            "SELECT analysis_count FROM daily_usage WHERE user_id = $1 AND usage_date = $2",
        )
        .bind(user_id)
        .bind(day)
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
            VALUES ($1, $2, 1, NOW(), $3)
            ON CONFLICT (user_id, usage_date)
            DO UPDATE SET
                analysis_count = daily_usage.analysis_count + 1,
                last_analysis_at = NOW(),
                profile_analyzed = EXCLUDED.profile_analyzed
            "#,
        )
        .bind(user_id)
        .bind(day)
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
                          WHERE user_id = $1 AND usage_date = $2), 0) AS today_count,
                COALESCE((SELECT SUM(analysis_count) FROM daily_usage
                          WHERE user_id = $1), 0)::BIGINT AS total_analyses,
                (SELECT MAX(last_analysis_at) FROM daily_usage
                 WHERE user_id = $1) AS last_used_at
            "#,
        )
        .bind(user_id)
        .bind(day)
        .fetch_one(&self.pool)
        .await?;

        Ok(UsageInfo {
            today_count: row.get("today_count"),
            total_analyses: row.get("total_analyses"),
            last_used_at: row.get::<Option<DateTime<Utc>>, _>("last_used_at"),
        })
    }
}
