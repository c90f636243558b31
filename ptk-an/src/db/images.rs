//! Image persistence
//!
//! The image row and its measurement are written in one transaction:
//! a failed analysis must never leave an orphan Image behind, and a
//! committed Image always has exactly one Measurement.

use chrono::{DateTime, Utc};
use ptk_common::db::models::{format_timestamp, ImageRecord, Measurement};
use ptk_common::Result;
use sqlx::SqlitePool;

/// Fields for a new image row
#[derive(Debug, Clone)]
pub struct NewImage {
    pub plant_id: i64,
    pub filename: String,
    pub filepath: String,
    pub captured_at: DateTime<Utc>,
}

/// Fields for a new measurement row
#[derive(Debug, Clone)]
pub struct NewMeasurement {
    pub plant_id: i64,
    pub area_px: i64,
    pub area_mm2: Option<f64>,
    pub px_per_mm: Option<f64>,
    pub mean_hue: f64,
    pub mean_saturation: f64,
    pub greenness_index: f64,
    pub health_score: f64,
    pub growth_rate: Option<f64>,
    pub is_overgrown: bool,
    pub measured_at: DateTime<Utc>,
}

/// Atomically insert an image and its measurement; returns (image_id,
/// measurement_id). Rolls back both rows on any failure.
pub async fn insert_image_and_measurement(
    pool: &SqlitePool,
    image: &NewImage,
    measurement: &NewMeasurement,
) -> Result<(i64, i64)> {
    let mut tx = pool.begin().await?;

    let image_result = sqlx::query(
        r#"
        INSERT INTO images (plant_id, filename, filepath, captured_at, uploaded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(image.plant_id)
    .bind(&image.filename)
    .bind(&image.filepath)
    .bind(format_timestamp(image.captured_at))
    .bind(format_timestamp(Utc::now()))
    .execute(&mut *tx)
    .await?;

    let image_id = image_result.last_insert_rowid();

    let measurement_result = sqlx::query(
        r#"
        INSERT INTO measurements
            (image_id, plant_id, area_px, area_mm2, px_per_mm,
             mean_hue, mean_saturation, greenness_index,
             health_score, growth_rate, is_overgrown, measured_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(image_id)
    .bind(measurement.plant_id)
    .bind(measurement.area_px)
    .bind(measurement.area_mm2)
    .bind(measurement.px_per_mm)
    .bind(measurement.mean_hue)
    .bind(measurement.mean_saturation)
    .bind(measurement.greenness_index)
    .bind(measurement.health_score)
    .bind(measurement.growth_rate)
    .bind(measurement.is_overgrown as i64)
    .bind(format_timestamp(measurement.measured_at))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((image_id, measurement_result.last_insert_rowid()))
}

/// Fetch a single image by id
pub async fn get_image(pool: &SqlitePool, image_id: i64) -> Result<Option<ImageRecord>> {
    let row = sqlx::query("SELECT * FROM images WHERE id = ?")
        .bind(image_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(ImageRecord::from_row).transpose()
}

/// Fetch an image by its source filepath (re-submission detection)
pub async fn find_image_by_filepath(
    pool: &SqlitePool,
    filepath: &str,
) -> Result<Option<ImageRecord>> {
    let row = sqlx::query("SELECT * FROM images WHERE filepath = ?")
        .bind(filepath)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(ImageRecord::from_row).transpose()
}

/// All images for a plant, oldest capture first
pub async fn list_images_for_plant(
    pool: &SqlitePool,
    plant_id: i64,
) -> Result<Vec<ImageRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM images WHERE plant_id = ? ORDER BY captured_at, id",
    )
    .bind(plant_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(ImageRecord::from_row).collect()
}

/// The measurement attached to an image, if any
pub async fn get_measurement_for_image(
    pool: &SqlitePool,
    image_id: i64,
) -> Result<Option<Measurement>> {
    let row = sqlx::query("SELECT * FROM measurements WHERE image_id = ?")
        .bind(image_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Measurement::from_row).transpose()
}
