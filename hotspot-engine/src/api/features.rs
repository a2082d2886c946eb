//! Feature regeneration API handler
//!
//! POST /features/regenerate

use axum::{extract::State, routing::post, Json, Router};

use crate::{
    error::ApiResult,
    services::{RegenerationRequest, RegenerationSummary},
    AppState,
};

/// POST /features/regenerate
///
/// Refreshes stale or missing feature bundles in one scope. Current bundles
/// are skipped unless `force_regenerate` is set.
pub async fn regenerate_features(
    State(state): State<AppState>,
    Json(request): Json<RegenerationRequest>,
) -> ApiResult<Json<RegenerationSummary>> {
    tracing::info!(scope = %request.scope, force_regenerate = request.force_regenerate, "Feature regeneration requested");
    let concurrency = state.orchestrator.defaults().extraction_concurrency;
    let summary = state.pipeline.regenerate(&request, concurrency).await?;
    Ok(Json(summary))
}

/// Build feature routes
pub fn feature_routes() -> Router<AppState> {
    Router::new().route("/features/regenerate", post(regenerate_features))
}
