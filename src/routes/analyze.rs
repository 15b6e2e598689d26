use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};

use super::ErrorBody;
use crate::{
    AppState,
    auth::UserId,
    models::AnalysisResult,
    pipeline::{ProgressEvent, ProgressReporter},
    services::{AnalysisError, AnalysisOutcome},
};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Username, @handle, or profile URL.
    pub profile_input: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub cache_hit: bool,
}

impl From<AnalysisOutcome> for AnalyzeResponse {
    fn from(outcome: AnalysisOutcome) -> Self {
        Self {
            result: outcome.result,
            cache_hit: outcome.cache_hit,
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AnalysisError> {
    let progress = ProgressReporter::disabled();
    let outcome = state
        .coordinator
        .submit(user_id, &request.profile_input, &progress)
        .await?;
    Ok(Json(outcome.into()))
}

enum StreamPhase {
    Running {
        rx: UnboundedReceiver<ProgressEvent>,
        task: JoinHandle<Result<AnalysisOutcome, AnalysisError>>,
    },
    Finished,
}

/// Streaming variant: `progress` events while the analysis runs, then a
/// single `result` or `error` event.
pub async fn analyze_stream(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<AnalyzeRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (progress, rx) = ProgressReporter::channel();
    let coordinator = state.coordinator.clone();
    let task = tokio::spawn(async move {
        coordinator
            .submit(user_id, &request.profile_input, &progress)
            .await
    });

    let stream = futures::stream::unfold(StreamPhase::Running { rx, task }, |phase| async {
        match phase {
            StreamPhase::Running { mut rx, task } => match rx.recv().await {
                Some(event) => Some((
                    Ok(sse_event("progress", &event)),
                    StreamPhase::Running { rx, task },
                )),
                // The reporter is gone: the submit has finished either way.
                None => {
                    let event = match task.await {
                        Ok(Ok(outcome)) => {
                            sse_event("result", &AnalyzeResponse::from(outcome))
                        }
                        Ok(Err(e)) => sse_event("error", &ErrorBody::new(&e)),
                        Err(e) => {
                            tracing::error!(error = %e, "analysis task panicked");
                            Event::default().event("error").data("analysis task failed")
                        }
                    };
                    Some((Ok(event), StreamPhase::Finished))
                }
            },
            StreamPhase::Finished => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sse_event<T: Serialize>(name: &str, data: &T) -> Event {
    match Event::default().event(name).json_data(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, event = name, "failed to serialize SSE event");
            Event::default().event("error").data("serialization failed")
        }
    }
}
