//! Hotspot API handlers
//!
//! GET /hotspots, GET /hotspots/:id, POST /hotspots/:id/status

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{Hotspot, HotspotDetail, HotspotStatus},
    AppState,
};

/// Query of GET /hotspots
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub scope: Option<String>,
    pub status: Option<String>,
}

/// POST /hotspots/:id/status request
#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: HotspotStatus,
}

/// GET /hotspots
///
/// Highest rank first.
pub async fn list_hotspots(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Hotspot>>> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(value) => Some(
            HotspotStatus::parse(value)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown hotspot status: {}", value)))?,
        ),
    };
    let hotspots = state.hotspots.list_hotspots(query.scope.as_deref(), status).await?;
    Ok(Json(hotspots))
}

/// GET /hotspots/:id
///
/// Includes membership rows.
pub async fn get_hotspot(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<HotspotDetail>> {
    let detail = state
        .hotspots
        .get_hotspot(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Hotspot not found: {}", id)))?;
    Ok(Json(detail))
}

/// POST /hotspots/:id/status
pub async fn update_hotspot_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> ApiResult<Json<Hotspot>> {
    let hotspot = state.hotspots.update_status(id, change.status).await?;
    tracing::info!(hotspot_id = %id, status = hotspot.status.as_str(), "Hotspot status changed");
    Ok(Json(hotspot))
}

/// Build hotspot routes
pub fn hotspot_routes() -> Router<AppState> {
    Router::new()
        .route("/hotspots", get(list_hotspots))
        .route("/hotspots/:id", get(get_hotspot))
        .route("/hotspots/:id/status", post(update_hotspot_status))
}
