use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    cache::CacheError,
    ledger::LedgerError,
    pipeline::PipelineError,
    providers::ProviderError,
};

/// Everything that can go wrong handling an analysis request, shaped for
/// the HTTP layer: each variant maps to one response code.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Validation(String),

    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("daily analysis limit reached")]
    QuotaExceeded { resets_at: DateTime<Utc> },

    #[error("an identical analysis is already running")]
    InProgress,

    #[error("upstream provider rejected the request: {0}")]
    Upstream(String),

    #[error("analysis temporarily unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AnalysisError {
    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::Validation(_) => "invalid_input",
            AnalysisError::NotFound(_) => "profile_not_found",
            AnalysisError::QuotaExceeded { .. } => "quota_exceeded",
            AnalysisError::InProgress => "analysis_in_progress",
            AnalysisError::Upstream(_) => "upstream_error",
            AnalysisError::Unavailable(_) => "unavailable",
            AnalysisError::Cache(_) | AnalysisError::Ledger(_) => "internal_error",
        }
    }
}

impl From<PipelineError> for AnalysisError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Terminal(ProviderError::NotFound(who)) => AnalysisError::NotFound(who),
            PipelineError::Terminal(e) => AnalysisError::Upstream(e.to_string()),
            exhausted @ PipelineError::Exhausted { .. } => {
                AnalysisError::Unavailable(exhausted.detail())
            }
        }
    }
}
