//! Plant registry operations
//!
//! `resolve_plant` is the only write path: get-or-create keyed on the QR
//! code payload. The UNIQUE constraint on `plants.code` makes creation
//! exactly-once per code even when two first sightings race.

use chrono::Utc;
use ptk_common::db::models::{format_timestamp, Plant, PlantDetail, PlantSummary};
use ptk_common::{Error, Result};
use sqlx::SqlitePool;

use super::{images, measurements};

/// Look up a Plant by code, creating it on first sighting.
///
/// New plants have no display name; that field belongs to the dashboard.
pub async fn resolve_plant(pool: &SqlitePool, code: &str) -> Result<Plant> {
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::InvalidInput("Plant code must be non-empty".to_string()));
    }

    // Insert-if-absent, then read back: loses gracefully to a concurrent
    // creator instead of erroring on the unique constraint.
    sqlx::query("INSERT INTO plants (code, created_at) VALUES (?, ?) ON CONFLICT(code) DO NOTHING")
        .bind(code)
        .bind(format_timestamp(Utc::now()))
        .execute(pool)
        .await?;

    let row = sqlx::query("SELECT * FROM plants WHERE code = ?")
        .bind(code)
        .fetch_one(pool)
        .await?;

    Plant::from_row(&row)
}

/// Fetch a single plant by id
pub async fn get_plant(pool: &SqlitePool, plant_id: i64) -> Result<Option<Plant>> {
    let row = sqlx::query("SELECT * FROM plants WHERE id = ?")
        .bind(plant_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Plant::from_row).transpose()
}

/// All plants with summary statistics from each one's latest measurement
pub async fn list_plant_summaries(pool: &SqlitePool) -> Result<Vec<PlantSummary>> {
    let rows = sqlx::query("SELECT * FROM plants ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in &rows {
        let plant = Plant::from_row(row)?;

        let image_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE plant_id = ?")
                .bind(plant.id)
                .fetch_one(pool)
                .await?;

        let latest = measurements::latest_measurement(pool, plant.id).await?;

        summaries.push(PlantSummary {
            id: plant.id,
            code: plant.code,
            display_name: plant.display_name,
            created_at: plant.created_at,
            latest_area_mm2: latest.as_ref().and_then(|m| m.area_mm2),
            latest_health_score: latest.as_ref().map(|m| m.health_score),
            latest_is_overgrown: latest.as_ref().map(|m| m.is_overgrown),
            image_count,
        });
    }

    Ok(summaries)
}

/// Full plant record with all images and measurements
pub async fn get_plant_detail(pool: &SqlitePool, plant_id: i64) -> Result<Option<PlantDetail>> {
    let Some(plant) = get_plant(pool, plant_id).await? else {
        return Ok(None);
    };

    Ok(Some(PlantDetail {
        images: images::list_images_for_plant(pool, plant_id).await?,
        measurements: measurements::list_measurements(pool, plant_id).await?,
        plant,
    }))
}
