use axum::{Json, extract::State};

use crate::{AppState, auth::UserId, models::QuotaStatus, services::AnalysisError};

pub async fn quota(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<QuotaStatus>, AnalysisError> {
    Ok(Json(state.coordinator.quota_status(user_id).await?))
}
