//! Batch analysis trigger

use std::path::PathBuf;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::image_scanner::ScanError;
use crate::workflow::{run_batch, BatchSummary};
use crate::AppState;

/// Optional request body for POST /api/analyze
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    /// Directory to scan; defaults to the configured image directory
    pub image_dir: Option<PathBuf>,
}

/// POST /api/analyze
///
/// Runs a batch over the image directory and returns its summary.
/// Batches are serialized behind the analysis lock; a second request
/// while one is running waits its turn.
pub async fn trigger_analysis(
    State(state): State<AppState>,
    body: Option<Json<AnalyzeRequest>>,
) -> ApiResult<Json<BatchSummary>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let image_dir = request
        .image_dir
        .unwrap_or_else(|| state.settings.image_dir.clone());

    let _guard = state.analysis_lock.lock().await;
    info!("Analysis requested over {}", image_dir.display());

    let summary = run_batch(
        &state.db,
        state.locator.clone(),
        state.settings.clone(),
        &image_dir,
    )
    .await
    .map_err(|e| match e {
        ScanError::PathNotFound(_) | ScanError::NotADirectory(_) => {
            ApiError::BadRequest(e.to_string())
        }
        ScanError::FileAccessError(_, _) => ApiError::Internal(e.to_string()),
    })?;

    Ok(Json(summary))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/api/analyze", post(trigger_analysis))
}
