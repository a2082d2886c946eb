//! Signal ingestion API handlers
//!
//! POST /signals, GET /signals/:id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{NewSignal, RootCause, Signal},
    services::FeatureStatus,
    AppState,
};

/// POST /signals response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub signal_id: Uuid,
    pub scope: String,
    pub root_cause: Option<RootCause>,
    pub confidence: Option<f64>,
    pub ai_enhancement_needed: bool,
    /// False when the embedding provider failed; features are retried later
    pub features_ready: bool,
}

/// POST /signals
///
/// Stores one signal with features and classification computed inline.
pub async fn ingest_signal(
    State(state): State<AppState>,
    Json(request): Json<NewSignal>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Signal title must not be empty".to_string()));
    }
    if request.scope.trim().is_empty() {
        return Err(ApiError::BadRequest("Signal scope must not be empty".to_string()));
    }

    let annotated = state.pipeline.ingest(request).await?;
    let classification = annotated.signal.classification.as_ref();
    let response = IngestResponse {
        signal_id: annotated.signal.id,
        scope: annotated.signal.scope.clone(),
        root_cause: classification.map(|c| c.root_cause),
        confidence: classification.map(|c| c.confidence),
        ai_enhancement_needed: classification.map(|c| c.ai_enhancement_needed).unwrap_or(true),
        features_ready: annotated.status == FeatureStatus::Regenerated,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /signals/:id
pub async fn get_signal(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Signal>> {
    let signal = state
        .signals
        .get_signal(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Signal not found: {}", id)))?;
    Ok(Json(signal))
}

/// Build signal routes
pub fn signal_routes() -> Router<AppState> {
    Router::new()
        .route("/signals", post(ingest_signal))
        .route("/signals/:id", get(get_signal))
}
