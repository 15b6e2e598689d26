mod analyze;
mod health;
mod quota;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AppState, services::AnalysisError};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/analyze", post(analyze::analyze))
        .route("/api/v1/analyze/stream", post(analyze::analyze_stream))
        .route("/api/v1/quota", get(quota::quota))
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resets_at: Option<DateTime<Utc>>,
}

impl ErrorBody {
    pub(crate) fn new(err: &AnalysisError) -> Self {
        let resets_at = match err {
            AnalysisError::QuotaExceeded { resets_at } => Some(*resets_at),
            _ => None,
        };
        Self {
            error: ErrorDetail {
                code: err.code(),
                message: err.to_string(),
                resets_at,
            },
        }
    }
}

fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
        AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
        AnalysisError::InProgress => StatusCode::CONFLICT,
        AnalysisError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        AnalysisError::Upstream(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AnalysisError::Cache(_) | AnalysisError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody::new(&self))).into_response()
    }
}
