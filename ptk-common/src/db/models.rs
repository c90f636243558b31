//! Record models for plants, images, and measurements
//!
//! Timestamps are stored as RFC 3339 TEXT in SQLite and surfaced as
//! `DateTime<Utc>`. Row mapping is explicit so schema drift fails loudly.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// A single tracked plant, identified by its QR code payload
#[derive(Debug, Clone, Serialize)]
pub struct Plant {
    pub id: i64,
    pub code: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Plant {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.get("id"),
            code: row.get("code"),
            display_name: row.get("display_name"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        })
    }
}

/// A single time-stamped photograph of a plant
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub plant_id: i64,
    pub filename: String,
    pub filepath: String,
    pub captured_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.get("id"),
            plant_id: row.get("plant_id"),
            filename: row.get("filename"),
            filepath: row.get("filepath"),
            captured_at: parse_timestamp(&row.get::<String, _>("captured_at"))?,
            uploaded_at: parse_timestamp(&row.get::<String, _>("uploaded_at"))?,
        })
    }
}

/// Per-image analysis results: area, color metrics, health score, growth
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub id: i64,
    pub image_id: i64,
    pub plant_id: i64,
    pub area_px: i64,
    /// Present together with `px_per_mm` when the ruler was detected
    pub area_mm2: Option<f64>,
    pub px_per_mm: Option<f64>,
    pub mean_hue: f64,
    pub mean_saturation: f64,
    pub greenness_index: f64,
    pub health_score: f64,
    /// Absent for a plant's first measurement
    pub growth_rate: Option<f64>,
    pub is_overgrown: bool,
    pub measured_at: DateTime<Utc>,
}

impl Measurement {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.get("id"),
            image_id: row.get("image_id"),
            plant_id: row.get("plant_id"),
            area_px: row.get("area_px"),
            area_mm2: row.get("area_mm2"),
            px_per_mm: row.get("px_per_mm"),
            mean_hue: row.get("mean_hue"),
            mean_saturation: row.get("mean_saturation"),
            greenness_index: row.get("greenness_index"),
            health_score: row.get("health_score"),
            growth_rate: row.get("growth_rate"),
            is_overgrown: row.get::<i64, _>("is_overgrown") != 0,
            measured_at: parse_timestamp(&row.get::<String, _>("measured_at"))?,
        })
    }
}

/// Lightweight plant record for list views, carrying the latest
/// measurement's headline numbers
#[derive(Debug, Clone, Serialize)]
pub struct PlantSummary {
    pub id: i64,
    pub code: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub latest_area_mm2: Option<f64>,
    pub latest_health_score: Option<f64>,
    pub latest_is_overgrown: Option<bool>,
    pub image_count: i64,
}

/// Full plant record including all images and measurements
#[derive(Debug, Clone, Serialize)]
pub struct PlantDetail {
    #[serde(flatten)]
    pub plant: Plant,
    pub images: Vec<ImageRecord>,
    pub measurements: Vec<Measurement>,
}

/// Parse an RFC 3339 timestamp from the database
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Format a timestamp for storage
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}
