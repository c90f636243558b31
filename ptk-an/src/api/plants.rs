//! Plant read endpoints
//!
//! All read-only: plant identity is created by the analysis pipeline
//! (first QR sighting), never through the API.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use ptk_common::db::models::{Measurement, PlantDetail, PlantSummary};

use crate::db::{measurements, plants};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/plants
///
/// All registered plants with latest-measurement summary statistics.
pub async fn list_plants(State(state): State<AppState>) -> ApiResult<Json<Vec<PlantSummary>>> {
    let summaries = plants::list_plant_summaries(&state.db).await?;
    Ok(Json(summaries))
}

/// GET /api/plants/:id
///
/// Full plant record with its images and measurement history.
pub async fn get_plant(
    State(state): State<AppState>,
    Path(plant_id): Path<i64>,
) -> ApiResult<Json<PlantDetail>> {
    let detail = plants::get_plant_detail(&state.db, plant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Plant {} not found", plant_id)))?;
    Ok(Json(detail))
}

/// GET /api/plants/:id/measurements
///
/// Measurement time series for one plant, oldest first.
pub async fn list_plant_measurements(
    State(state): State<AppState>,
    Path(plant_id): Path<i64>,
) -> ApiResult<Json<Vec<Measurement>>> {
    if plants::get_plant(&state.db, plant_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Plant {} not found", plant_id)));
    }
    let history = measurements::list_measurements(&state.db, plant_id).await?;
    Ok(Json(history))
}

/// Build plant routes
pub fn plant_routes() -> Router<AppState> {
    Router::new()
        .route("/api/plants", get(list_plants))
        .route("/api/plants/:id", get(get_plant))
        .route("/api/plants/:id/measurements", get(list_plant_measurements))
}
