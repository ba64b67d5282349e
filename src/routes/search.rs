//! Search workflow endpoints
//!
//! `GET /api/search?q=...` starts a run and streams `WorkflowState`
//! snapshots as server-sent events until the run settles. Dropping the
//! stream (the client navigating away mid-run) cancels the workflow.
//! Feedback on the drafted answer arrives on a separate POST, routed to the
//! run by id.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{AppState, FeedbackRequest, RunRegistry, SearchParams};
use crate::types::AppError;
use crate::workflow::engine::{WorkflowEvents, WorkflowHandle};
use crate::workflow::WorkflowState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(start_search))
        .route("/api/search/{id}/feedback", post(submit_feedback))
        .with_state(state)
}

/// Cancels and unregisters a run when its progress stream goes away.
struct RunGuard {
    handle: WorkflowHandle,
    runs: RunRegistry,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.handle.cancel();
        if let Ok(mut runs) = self.runs.write() {
            runs.remove(&self.handle.id());
        }
    }
}

async fn start_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "query parameter q is required".to_string(),
        ));
    }

    let (handle, events) = state.engine.start(&query).map_err(|e| {
        warn!(error = %e, "Failed to start search workflow");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    state
        .runs
        .write()
        .expect("run registry lock poisoned")
        .insert(handle.id(), handle.clone());
    info!(run_id = %handle.id(), "Streaming workflow progress");

    let guard = RunGuard {
        handle,
        runs: state.runs.clone(),
    };
    Ok(Sse::new(snapshot_stream(events, guard)).keep_alive(KeepAlive::default()))
}

/// Snapshot stream for one run, ending after the terminal snapshot. The
/// guard rides along so the run is torn down when the stream is dropped.
fn snapshot_stream(
    events: WorkflowEvents,
    guard: RunGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(
        (events, guard, false),
        |(mut events, guard, done)| async move {
            if done {
                return None;
            }
            let snapshot = events.recv().await?;
            let done = snapshot.status.is_terminal();
            Some((snapshot, (events, guard, done)))
        },
    )
    .filter_map(|snapshot| async move {
        match Event::default().event("state").json_data(&snapshot) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "Failed to encode workflow snapshot");
                None
            }
        }
    })
}

async fn submit_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<WorkflowState>, (StatusCode, String)> {
    let handle = state
        .runs
        .read()
        .expect("run registry lock poisoned")
        .get(&id)
        .cloned()
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no active run {}", id)))?;

    match handle.submit_feedback(request.feedback) {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(AppError::InvalidRequest(message)) => Err((StatusCode::CONFLICT, message)),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
