//! Growth tracking
//!
//! Derives the growth rate of the newest measurement against its
//! immediate predecessor, and the overgrowth flag.
//!
//! Unit rule: mm² is used only when both measurements carry it;
//! otherwise both sides fall back to pixel area. Units are never mixed.
//!
//! Timestamp rule: the new measurement must be strictly later than its
//! predecessor; equal or reversed timestamps yield no growth rate.

use chrono::{DateTime, Utc};
use ptk_common::db::models::Measurement;
use tracing::warn;

/// Growth rate in area units per hour, or `None` when it cannot be
/// derived (no predecessor, or non-increasing timestamps).
pub fn growth_rate(
    new_area_px: u64,
    new_area_mm2: Option<f64>,
    new_measured_at: DateTime<Utc>,
    predecessor: Option<&Measurement>,
) -> Option<f64> {
    let prev = predecessor?;

    let hours = (new_measured_at - prev.measured_at).num_milliseconds() as f64 / 3_600_000.0;
    if hours <= 0.0 {
        warn!(
            "Predecessor measurement is not strictly earlier ({} vs {}); skipping growth rate",
            prev.measured_at, new_measured_at
        );
        return None;
    }

    let (new_area, prev_area) = match (new_area_mm2, prev.area_mm2) {
        (Some(new_mm2), Some(prev_mm2)) => (new_mm2, prev_mm2),
        _ => (new_area_px as f64, prev.area_px as f64),
    };

    Some((new_area - prev_area) / hours)
}

/// Overgrowth flag, millimeter domain only.
///
/// The configured threshold is denominated in mm²; comparing raw pixel
/// counts against it would be a unit mismatch, so uncalibrated
/// measurements have the flag suppressed (with a warning) instead.
pub fn is_overgrown(area_mm2: Option<f64>, threshold_mm2: f64) -> bool {
    match area_mm2 {
        Some(area) => area > threshold_mm2,
        None => {
            warn!("No calibration for this measurement; overgrowth flag suppressed");
            false
        }
    }
}
