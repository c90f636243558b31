//! Image read endpoints

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use ptk_common::db::models::{ImageRecord, Measurement};

use crate::db::images;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Image metadata together with its measurement
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    #[serde(flatten)]
    pub image: ImageRecord,
    pub measurement: Option<Measurement>,
}

/// GET /api/images/:id
///
/// Image metadata and the measurement derived from it.
pub async fn get_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
) -> ApiResult<Json<ImageResponse>> {
    let image = images::get_image(&state.db, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Image {} not found", image_id)))?;
    let measurement = images::get_measurement_for_image(&state.db, image_id).await?;

    Ok(Json(ImageResponse { image, measurement }))
}

/// GET /api/images/:id/file
///
/// The raw photograph bytes. A recorded image whose file has since been
/// removed from disk is a 404, not a 500.
pub async fn get_image_file(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
) -> ApiResult<Response> {
    let image = images::get_image(&state.db, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Image {} not found", image_id)))?;

    let bytes = match tokio::fs::read(&image.filepath).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!(
                "Image file missing on disk: {}",
                image.filepath
            )));
        }
        Err(e) => return Err(ApiError::Io(e)),
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type_for(&image.filename))],
        bytes,
    )
        .into_response())
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Build image routes
pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/api/images/:id", get(get_image))
        .route("/api/images/:id/file", get(get_image_file))
}
