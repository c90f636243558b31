//! Metric derivation
//!
//! Turns raw color/area statistics into the persisted health metrics:
//! greenness index, weighted health score, and physical area.

use ptk_common::Settings;

/// Canonical green hue, degrees
const GREEN_HUE_DEG: f64 = 120.0;

/// Scoring weights for the health score, passed in explicitly so tests
/// can sweep weight combinations deterministically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthWeights {
    pub greenness: f64,
    pub saturation: f64,
    pub growth: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            greenness: 0.4,
            saturation: 0.3,
            growth: 0.3,
        }
    }
}

impl From<&Settings> for HealthWeights {
    fn from(s: &Settings) -> Self {
        Self {
            greenness: s.health_weight_greenness,
            saturation: s.health_weight_saturation,
            growth: s.health_weight_growth,
        }
    }
}

/// Saturation-weighted proximity of the mean hue to the canonical green
/// band: 1.0 = fully green and saturated, 0.0 = far from green or
/// desaturated. Always in [0, 1].
pub fn greenness_index(mean_hue_deg: f64, mean_saturation: f64, band_width_deg: f64) -> f64 {
    if band_width_deg <= 0.0 {
        return 0.0;
    }
    let proximity = (1.0 - (mean_hue_deg - GREEN_HUE_DEG).abs() / band_width_deg).clamp(0.0, 1.0);
    (proximity * mean_saturation.clamp(0.0, 1.0)).clamp(0.0, 1.0)
}

/// Normalized growth trend in [-1, 1]: 0 with no history, otherwise the
/// growth rate scaled by the saturation bound and clamped. Positive
/// trends raise the health score, negative trends lower it.
pub fn growth_trend_component(growth_rate: Option<f64>, saturation_bound: f64) -> f64 {
    match growth_rate {
        Some(rate) if saturation_bound > 0.0 => (rate / saturation_bound).clamp(-1.0, 1.0),
        Some(rate) => rate.signum().clamp(-1.0, 1.0),
        None => 0.0,
    }
}

/// Composite health score in [0, 100]
///
/// `100 * clamp01(w_g * greenness + w_s * sat_norm + w_t * trend)` where
/// `sat_norm` compares the mean saturation against the healthy reference.
pub fn health_score(
    greenness: f64,
    mean_saturation: f64,
    trend: f64,
    weights: HealthWeights,
    healthy_saturation_ref: f64,
) -> f64 {
    let sat_norm = if healthy_saturation_ref > 0.0 {
        (mean_saturation / healthy_saturation_ref).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let raw = weights.greenness * greenness.clamp(0.0, 1.0)
        + weights.saturation * sat_norm
        + weights.growth * trend.clamp(-1.0, 1.0);

    100.0 * raw.clamp(0.0, 1.0)
}

/// Physical area from pixel area; absent without a usable calibration
pub fn area_mm2(area_px: u64, px_per_mm: Option<f64>) -> Option<f64> {
    match px_per_mm {
        Some(scale) if scale > 0.0 => Some(area_px as f64 / (scale * scale)),
        _ => None,
    }
}
