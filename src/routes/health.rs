use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    cache: ComponentHealth,
    ledger: ComponentHealth,
}

#[derive(Debug, Serialize)]
struct ComponentHealth {
    ok: bool,
    latency_ms: u64,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let cache_ok = state.cache.get_bytes("tl:health").await.is_ok();
    let cache = ComponentHealth {
        ok: cache_ok,
        latency_ms: started.elapsed().as_millis() as u64,
    };

    let started = Instant::now();
    let ledger_ok = state
        .ledger
        .today_count(Uuid::nil(), Utc::now().date_naive())
        .await
        .is_ok();
    let ledger = ComponentHealth {
        ok: ledger_ok,
        latency_ms: started.elapsed().as_millis() as u64,
    };

    let healthy = cache.ok && ledger.ok;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            cache,
            ledger,
        }),
    )
}
