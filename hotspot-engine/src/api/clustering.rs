//! Clustering job API handlers
//!
//! POST /clustering/start, GET /clustering/status/:job_id,
//! GET /clustering/results/:job_id, POST /clustering/cancel/:job_id,
//! GET /clustering/events

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{sse::Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{ClusteringRequest, ClusteringResult, JobStatus, JobStatusView},
    services::{CancelAcknowledgement, StartOutcome},
    AppState,
};

/// POST /clustering/start
///
/// Queues a job and returns 202 at once. A scope that already has an active
/// job gets that job's id with `already_running: true`.
pub async fn start_clustering(
    State(state): State<AppState>,
    Json(request): Json<ClusteringRequest>,
) -> ApiResult<(StatusCode, Json<StartOutcome>)> {
    let outcome = state.orchestrator.start(request).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// GET /clustering/status/:job_id
pub async fn clustering_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusView>> {
    let job = state
        .orchestrator
        .job(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Clustering job not found: {}", job_id)))?;
    Ok(Json(JobStatusView::from(&job)))
}

/// GET /clustering/results/:job_id
///
/// 409 until the job has completed.
pub async fn clustering_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ClusteringResult>> {
    let job = state
        .orchestrator
        .job(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Clustering job not found: {}", job_id)))?;

    match (job.status, job.result) {
        (JobStatus::Completed, Some(result)) => Ok(Json(result)),
        (JobStatus::Failed, _) => Err(ApiError::Conflict(format!(
            "Clustering job {} failed: {}",
            job_id,
            job.error.unwrap_or_default()
        ))),
        (status, _) => Err(ApiError::Conflict(format!(
            "Clustering job {} has no results (status {:?})",
            job_id, status
        ))),
    }
}

/// POST /clustering/cancel/:job_id
pub async fn cancel_clustering(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<CancelAcknowledgement>> {
    let ack = state.orchestrator.cancel(job_id).await?;
    Ok(Json(ack))
}

/// Query of GET /clustering/events
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only stream events of this job
    pub job_id: Option<Uuid>,
}

/// GET /clustering/events
///
/// SSE stream of clustering and feature-regeneration events.
pub async fn clustering_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let job_filter = query.job_id;
    hotspot_common::sse::event_bus_sse_stream(&state.event_bus, "clustering", move |event| match job_filter {
        Some(job_id) => event.job_id() == Some(job_id),
        None => true,
    })
}

/// Build clustering routes
pub fn clustering_routes() -> Router<AppState> {
    Router::new()
        .route("/clustering/start", post(start_clustering))
        .route("/clustering/status/:job_id", get(clustering_status))
        .route("/clustering/results/:job_id", get(clustering_results))
        .route("/clustering/cancel/:job_id", post(cancel_clustering))
        .route("/clustering/events", get(clustering_events))
}
