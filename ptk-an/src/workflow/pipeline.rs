//! Per-image analysis pipeline
//!
//! Everything that can be computed from the photograph alone. History
//! dependent values (growth rate, trend, final health score) belong to
//! the orchestrator, which has the database.

use std::path::Path;

use image::GrayImage;
use tracing::{debug, info, warn};

use ptk_common::Settings;

use crate::error::AnalysisError;
use crate::services::calibrator::{calibrate_from_ruler, Calibration};
use crate::services::metrics;
use crate::services::qr_locator::CodeLocator;
use crate::services::segmenter::{segment_plant, Segmentation};

/// Result of analyzing a single photograph, before history is consulted
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    /// Decoded plant code from the QR tag
    pub code: String,
    /// Pixel-to-mm scale, when a ruler was found
    pub px_per_mm: Option<f64>,
    /// Plant area in pixels
    pub area_px: u64,
    /// Plant area in mm², when calibrated
    pub area_mm2: Option<f64>,
    /// Mean hue over the plant mask, degrees
    pub mean_hue: f64,
    /// Mean saturation over the plant mask, [0, 1]
    pub mean_saturation: f64,
    /// Greenness index, [0, 1]
    pub greenness_index: f64,
}

/// Run the full image-local pipeline on one photograph.
///
/// Stage order matters: identity first (a frame without a usable QR tag
/// is rejected before any heavier work), then calibration (optional),
/// then segmentation and color metrics.
pub fn analyze_image(
    path: &Path,
    locator: &dyn CodeLocator,
    settings: &Settings,
) -> Result<AnalysisOutput, AnalysisError> {
    debug!("Analyzing {}", path.display());

    let dynamic = image::open(path)
        .map_err(|e| AnalysisError::UnreadableImage(format!("{}: {}", path.display(), e)))?;
    let gray: GrayImage = dynamic.to_luma8();
    let rgb = dynamic.to_rgb8();

    let code = locator.locate(&gray)?;

    let calibration: Option<Calibration> =
        calibrate_from_ruler(&gray, settings.ruler_tick_distance_mm, settings.ruler_roi);
    if calibration.is_none() {
        warn!(
            "{}: no ruler calibration, metrics stay in pixel units",
            path.display()
        );
    }
    let px_per_mm = calibration.map(|c| c.px_per_mm);

    let segmentation: Segmentation = segment_plant(&rgb, settings)?;

    let area_mm2 = metrics::area_mm2(segmentation.area_px, px_per_mm);
    let greenness = metrics::greenness_index(
        segmentation.mean_hue,
        segmentation.mean_saturation,
        settings.green_band_width_deg,
    );

    info!(
        "Analyzed {}: plant {}, {} px{}",
        path.display(),
        code,
        segmentation.area_px,
        area_mm2
            .map(|a| format!(" ({:.1} mm²)", a))
            .unwrap_or_default()
    );

    Ok(AnalysisOutput {
        code,
        px_per_mm,
        area_px: segmentation.area_px,
        area_mm2,
        mean_hue: segmentation.mean_hue,
        mean_saturation: segmentation.mean_saturation,
        greenness_index: greenness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLocator(&'static str);

    impl CodeLocator for FixedLocator {
        fn locate(&self, _image: &GrayImage) -> Result<String, AnalysisError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn unreadable_file_is_reported() {
        let settings = Settings::default();
        let err = analyze_image(
            Path::new("/nonexistent/photo.jpg"),
            &FixedLocator("PLANT-1"),
            &settings,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::UnreadableImage(_)));
    }

    #[test]
    fn green_frame_without_ruler_stays_in_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plant.png");

        let mut img = image::RgbImage::from_pixel(120, 120, image::Rgb([240, 240, 240]));
        for y in 30..90 {
            for x in 30..90 {
                img.put_pixel(x, y, image::Rgb([40, 180, 60]));
            }
        }
        img.save(&path).unwrap();

        let mut settings = Settings::default();
        settings.min_plant_area_px = 100;
        settings.min_component_area_px = 100;

        let out = analyze_image(&path, &FixedLocator("PLANT-1"), &settings).unwrap();
        assert_eq!(out.code, "PLANT-1");
        assert_eq!(out.area_px, 3600);
        assert!(out.area_mm2.is_none());
        assert!(out.px_per_mm.is_none());
        assert!(out.greenness_index > 0.0);
    }

    #[test]
    fn qr_failure_precedes_segmentation() {
        struct NoCode;
        impl CodeLocator for NoCode {
            fn locate(&self, _image: &GrayImage) -> Result<String, AnalysisError> {
                Err(AnalysisError::NoQrCode)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        image::RgbImage::from_pixel(32, 32, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();

        let err = analyze_image(&path, &NoCode, &Settings::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::NoQrCode));
    }
}
