use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Quota ledger storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum DatabaseConfig {
    /// No database: usage counts live in memory and reset on restart.
    /// Only suitable for local development.
    #[default]
    None,

    /// SQLite ledger, single-node.
    Sqlite(SqliteConfig),

    /// Postgres ledger, required for multi-node deployments.
    Postgres(PostgresConfig),
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DatabaseConfig::None => Ok(()),
            DatabaseConfig::Sqlite(c) => c.validate(),
            DatabaseConfig::Postgres(c) => c.validate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteConfig {
    /// Path to the database file. Created if missing.
    pub path: String,

    #[serde(default = "default_sqlite_connections")]
    pub max_connections: u32,
}

impl SqliteConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::Validation(
                "sqlite path cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresConfig {
    /// Postgres connection URL.
    pub url: String,

    #[serde(default = "default_postgres_connections")]
    pub max_connections: u32,
}

impl PostgresConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Validation(
                "postgres url cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_sqlite_connections() -> u32 {
    5
}

fn default_postgres_connections() -> u32 {
    10
}
