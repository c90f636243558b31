//! Configuration loading and resolution
//!
//! All tunable thresholds, paths, and weights live in [`Settings`].
//! Resolution priority per field: environment variable (`PTK_*`) →
//! TOML config file → compiled default.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Rectangular region of interest in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    /// Parse an `x,y,w,h` string (the PTK_RULER_ROI format)
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Config(format!("Invalid ROI '{}': {}", s, e)))?;
        if parts.len() != 4 {
            return Err(Error::Config(format!(
                "Invalid ROI '{}': expected x,y,w,h",
                s
            )));
        }
        Ok(Roi {
            x: parts[0],
            y: parts[1],
            width: parts[2],
            height: parts[3],
        })
    }
}

/// Central configuration for the PlantTrack services
#[derive(Debug, Clone)]
pub struct Settings {
    // Paths
    pub image_dir: PathBuf,
    pub database_path: PathBuf,

    // API
    pub api_port: u16,
    pub cors_origins: Vec<String>,

    // Ruler / size calibration
    pub ruler_tick_distance_mm: f64,
    pub ruler_roi: Option<Roi>,

    // Plant segmentation (hue in degrees, saturation/value normalized 0-1)
    pub hue_lower_deg: f64,
    pub hue_upper_deg: f64,
    pub saturation_min: f64,
    pub value_min: f64,
    pub min_plant_area_px: u32,
    /// Connected components smaller than this are treated as noise
    pub min_component_area_px: u32,
    /// Rectangles masked out before thresholding (QR label, ruler strip, ...)
    pub exclusion_zones: Vec<Roi>,

    // Health score
    pub health_weight_greenness: f64,
    pub health_weight_saturation: f64,
    pub health_weight_growth: f64,
    pub healthy_saturation_ref: f64,
    pub green_band_width_deg: f64,
    /// Growth rate (area units per hour) at which the trend component saturates
    pub growth_rate_saturation: f64,

    // Overgrowth
    pub overgrowth_threshold_mm2: f64,

    // Batch processing
    pub analysis_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("./images"),
            database_path: PathBuf::from("./data/planttrack.db"),
            api_port: 5780,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            ruler_tick_distance_mm: 10.0,
            ruler_roi: None,
            hue_lower_deg: 50.0,
            hue_upper_deg: 190.0,
            saturation_min: 0.15,
            value_min: 0.15,
            min_plant_area_px: 500,
            min_component_area_px: 500,
            exclusion_zones: Vec::new(),
            health_weight_greenness: 0.4,
            health_weight_saturation: 0.3,
            health_weight_growth: 0.3,
            healthy_saturation_ref: 0.55,
            green_band_width_deg: 60.0,
            growth_rate_saturation: 5.0,
            overgrowth_threshold_mm2: 400.0,
            analysis_timeout_secs: 60,
        }
    }
}

/// TOML file representation of [`Settings`]: every field optional,
/// absent fields fall through to the next tier.
#[derive(Debug, Default, Deserialize)]
pub struct TomlSettings {
    pub image_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub api_port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
    pub ruler_tick_distance_mm: Option<f64>,
    pub ruler_roi: Option<Roi>,
    pub hue_lower_deg: Option<f64>,
    pub hue_upper_deg: Option<f64>,
    pub saturation_min: Option<f64>,
    pub value_min: Option<f64>,
    pub min_plant_area_px: Option<u32>,
    pub min_component_area_px: Option<u32>,
    pub exclusion_zones: Option<Vec<Roi>>,
    pub health_weight_greenness: Option<f64>,
    pub health_weight_saturation: Option<f64>,
    pub health_weight_growth: Option<f64>,
    pub healthy_saturation_ref: Option<f64>,
    pub green_band_width_deg: Option<f64>,
    pub growth_rate_saturation: Option<f64>,
    pub overgrowth_threshold_mm2: Option<f64>,
    pub analysis_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings with the standard tier order:
    /// environment → TOML config file → compiled defaults.
    pub fn load() -> Result<Self> {
        let toml = match default_config_path() {
            Some(path) if path.exists() => Some(load_toml_file(&path)?),
            _ => None,
        };
        Ok(Self::resolve(toml))
    }

    /// Load settings from an explicit TOML file path (then apply env overrides)
    pub fn load_from(path: &Path) -> Result<Self> {
        let toml = load_toml_file(path)?;
        Ok(Self::resolve(Some(toml)))
    }

    /// Apply TOML values over defaults, then environment overrides on top
    pub fn resolve(toml: Option<TomlSettings>) -> Self {
        let mut s = Settings::default();

        if let Some(t) = toml {
            if let Some(v) = t.image_dir {
                s.image_dir = v;
            }
            if let Some(v) = t.database_path {
                s.database_path = v;
            }
            if let Some(v) = t.api_port {
                s.api_port = v;
            }
            if let Some(v) = t.cors_origins {
                s.cors_origins = v;
            }
            if let Some(v) = t.ruler_tick_distance_mm {
                s.ruler_tick_distance_mm = v;
            }
            if let Some(v) = t.ruler_roi {
                s.ruler_roi = Some(v);
            }
            if let Some(v) = t.hue_lower_deg {
                s.hue_lower_deg = v;
            }
            if let Some(v) = t.hue_upper_deg {
                s.hue_upper_deg = v;
            }
            if let Some(v) = t.saturation_min {
                s.saturation_min = v;
            }
            if let Some(v) = t.value_min {
                s.value_min = v;
            }
            if let Some(v) = t.min_plant_area_px {
                s.min_plant_area_px = v;
            }
            if let Some(v) = t.min_component_area_px {
                s.min_component_area_px = v;
            }
            if let Some(v) = t.exclusion_zones {
                s.exclusion_zones = v;
            }
            if let Some(v) = t.health_weight_greenness {
                s.health_weight_greenness = v;
            }
            if let Some(v) = t.health_weight_saturation {
                s.health_weight_saturation = v;
            }
            if let Some(v) = t.health_weight_growth {
                s.health_weight_growth = v;
            }
            if let Some(v) = t.healthy_saturation_ref {
                s.healthy_saturation_ref = v;
            }
            if let Some(v) = t.green_band_width_deg {
                s.green_band_width_deg = v;
            }
            if let Some(v) = t.growth_rate_saturation {
                s.growth_rate_saturation = v;
            }
            if let Some(v) = t.overgrowth_threshold_mm2 {
                s.overgrowth_threshold_mm2 = v;
            }
            if let Some(v) = t.analysis_timeout_secs {
                s.analysis_timeout_secs = v;
            }
        }

        s.apply_env();
        s
    }

    /// Overlay `PTK_*` environment variables onto the current values
    fn apply_env(&mut self) {
        if let Some(v) = env_var("PTK_IMAGE_DIR") {
            self.image_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("PTK_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        env_parse("PTK_API_PORT", &mut self.api_port);
        env_parse("PTK_RULER_TICK_DISTANCE_MM", &mut self.ruler_tick_distance_mm);
        if let Some(v) = env_var("PTK_RULER_ROI") {
            match Roi::parse(&v) {
                Ok(roi) => self.ruler_roi = Some(roi),
                Err(e) => warn!("Ignoring PTK_RULER_ROI: {}", e),
            }
        }
        env_parse("PTK_HUE_LOWER_DEG", &mut self.hue_lower_deg);
        env_parse("PTK_HUE_UPPER_DEG", &mut self.hue_upper_deg);
        env_parse("PTK_SATURATION_MIN", &mut self.saturation_min);
        env_parse("PTK_VALUE_MIN", &mut self.value_min);
        env_parse("PTK_MIN_PLANT_AREA_PX", &mut self.min_plant_area_px);
        env_parse("PTK_MIN_COMPONENT_AREA_PX", &mut self.min_component_area_px);
        env_parse("PTK_HEALTH_WEIGHT_GREENNESS", &mut self.health_weight_greenness);
        env_parse("PTK_HEALTH_WEIGHT_SATURATION", &mut self.health_weight_saturation);
        env_parse("PTK_HEALTH_WEIGHT_GROWTH", &mut self.health_weight_growth);
        env_parse("PTK_HEALTHY_SATURATION_REF", &mut self.healthy_saturation_ref);
        env_parse("PTK_GREEN_BAND_WIDTH_DEG", &mut self.green_band_width_deg);
        env_parse("PTK_GROWTH_RATE_SATURATION", &mut self.growth_rate_saturation);
        env_parse("PTK_OVERGROWTH_THRESHOLD_MM2", &mut self.overgrowth_threshold_mm2);
        env_parse("PTK_ANALYSIS_TIMEOUT_SECS", &mut self.analysis_timeout_secs);
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Some(v) = env_var(name) {
        match v.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("Ignoring {}: cannot parse '{}'", name, v),
        }
    }
}

fn load_toml_file(path: &Path) -> Result<TomlSettings> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default platform config file location: `<config dir>/planttrack/planttrack.toml`,
/// overridable with PTK_CONFIG.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(v) = env_var("PTK_CONFIG") {
        return Some(PathBuf::from(v));
    }
    dirs::config_dir().map(|d| d.join("planttrack").join("planttrack.toml"))
}
