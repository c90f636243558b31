//! Measurement history queries
//!
//! Growth tracking depends on strict ordering: the predecessor query is
//! `measured_at < before` (strictly earlier), never `<=`.

use chrono::{DateTime, Utc};
use ptk_common::db::models::{format_timestamp, Measurement};
use ptk_common::Result;
use sqlx::SqlitePool;

/// All measurements for a plant, ordered by time ascending
pub async fn list_measurements(pool: &SqlitePool, plant_id: i64) -> Result<Vec<Measurement>> {
    let rows = sqlx::query(
        "SELECT * FROM measurements WHERE plant_id = ? ORDER BY measured_at, id",
    )
    .bind(plant_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Measurement::from_row).collect()
}

/// The most recent measurement for a plant strictly before `before`
/// (the growth-rate predecessor)
pub async fn latest_measurement_before(
    pool: &SqlitePool,
    plant_id: i64,
    before: DateTime<Utc>,
) -> Result<Option<Measurement>> {
    let row = sqlx::query(
        "SELECT * FROM measurements WHERE plant_id = ? AND measured_at < ? \
         ORDER BY measured_at DESC, id DESC LIMIT 1",
    )
    .bind(plant_id)
    .bind(format_timestamp(before))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(Measurement::from_row).transpose()
}

/// The most recent measurement for a plant, if any
pub async fn latest_measurement(
    pool: &SqlitePool,
    plant_id: i64,
) -> Result<Option<Measurement>> {
    let row = sqlx::query(
        "SELECT * FROM measurements WHERE plant_id = ? \
         ORDER BY measured_at DESC, id DESC LIMIT 1",
    )
    .bind(plant_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(Measurement::from_row).transpose()
}
