//! Batch analysis orchestration
//!
//! Scans the image directory and runs every photograph through the
//! pipeline. Scan failures abort the batch; per-image failures are
//! recorded and the batch continues. Images whose filepath is already in
//! the database are skipped, so re-running over the same directory only
//! picks up new photographs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use ptk_common::Settings;

use crate::db::{images, measurements, plants};
use crate::error::AnalysisError;
use crate::services::growth;
use crate::services::image_scanner::{ImageCandidate, ImageScanner, ScanError};
use crate::services::metrics::{self, HealthWeights};
use crate::services::qr_locator::CodeLocator;
use crate::workflow::pipeline::{analyze_image, AnalysisOutput};

/// Outcome of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Images analyzed and persisted in this run
    pub images_processed: usize,
    /// Distinct plants the processed images resolved to
    pub plants_found: usize,
    /// One entry per failed image: "filename: reason"
    pub errors: Vec<String>,
}

/// Scan `image_dir` and analyze every new photograph in it.
///
/// Images are processed in filename order, one at a time: growth rates
/// read each plant's history, so a later image must see its
/// predecessor's committed measurement.
pub async fn run_batch(
    pool: &SqlitePool,
    locator: Arc<dyn CodeLocator>,
    settings: Arc<Settings>,
    image_dir: &Path,
) -> Result<BatchSummary, ScanError> {
    let candidates = ImageScanner::new().scan(image_dir)?;
    info!(
        "Batch start: {} candidate images in {}",
        candidates.len(),
        image_dir.display()
    );

    let mut summary = BatchSummary {
        images_processed: 0,
        plants_found: 0,
        errors: Vec::new(),
    };
    let mut plant_ids = std::collections::HashSet::new();

    for candidate in candidates {
        match process_candidate(pool, locator.clone(), settings.clone(), &candidate).await {
            Ok(Some(plant_id)) => {
                summary.images_processed += 1;
                plant_ids.insert(plant_id);
            }
            Ok(None) => {} // already in the database
            Err(e) => {
                warn!("{}: {}", candidate.filename, e);
                summary.errors.push(format!("{}: {}", candidate.filename, e));
            }
        }
    }

    summary.plants_found = plant_ids.len();
    info!(
        "Batch done: {} processed, {} plants, {} errors",
        summary.images_processed,
        summary.plants_found,
        summary.errors.len()
    );
    Ok(summary)
}

/// Analyze and persist one candidate. `Ok(None)` means the image was
/// already processed in an earlier batch.
async fn process_candidate(
    pool: &SqlitePool,
    locator: Arc<dyn CodeLocator>,
    settings: Arc<Settings>,
    candidate: &ImageCandidate,
) -> Result<Option<i64>, AnalysisError> {
    let filepath = candidate.path.to_string_lossy().to_string();

    if images::find_image_by_filepath(pool, &filepath).await?.is_some() {
        info!("Skipping {}: already analyzed", candidate.filename);
        return Ok(None);
    }

    let output = run_pipeline_with_timeout(locator, settings.clone(), candidate).await?;

    let plant = plants::resolve_plant(pool, &output.code)
        .await
        .map_err(AnalysisError::Persistence)?;

    // Growth against the most recent committed measurement strictly
    // before this capture
    let predecessor =
        measurements::latest_measurement_before(pool, plant.id, candidate.captured_at).await?;
    let growth_rate = growth::growth_rate(
        output.area_px,
        output.area_mm2,
        candidate.captured_at,
        predecessor.as_ref(),
    );

    let trend = metrics::growth_trend_component(growth_rate, settings.growth_rate_saturation);
    let health_score = metrics::health_score(
        output.greenness_index,
        output.mean_saturation,
        trend,
        HealthWeights::from(settings.as_ref()),
        settings.healthy_saturation_ref,
    );
    let is_overgrown = growth::is_overgrown(output.area_mm2, settings.overgrowth_threshold_mm2);

    images::insert_image_and_measurement(
        pool,
        &images::NewImage {
            plant_id: plant.id,
            filename: candidate.filename.clone(),
            filepath,
            captured_at: candidate.captured_at,
        },
        &images::NewMeasurement {
            plant_id: plant.id,
            area_px: output.area_px as i64,
            area_mm2: output.area_mm2,
            px_per_mm: output.px_per_mm,
            mean_hue: output.mean_hue,
            mean_saturation: output.mean_saturation,
            greenness_index: output.greenness_index,
            health_score,
            growth_rate,
            is_overgrown,
            measured_at: candidate.captured_at,
        },
    )
    .await?;

    Ok(Some(plant.id))
}

/// Pipeline work is CPU bound (image decode, segmentation), so it runs
/// on the blocking pool under the configured per-image timeout.
async fn run_pipeline_with_timeout(
    locator: Arc<dyn CodeLocator>,
    settings: Arc<Settings>,
    candidate: &ImageCandidate,
) -> Result<AnalysisOutput, AnalysisError> {
    let path = candidate.path.clone();
    let timeout_secs = settings.analysis_timeout_secs;

    let task = tokio::task::spawn_blocking(move || {
        analyze_image(&path, locator.as_ref(), settings.as_ref())
    });

    match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(AnalysisError::UnreadableImage(format!(
            "analysis task failed: {}",
            join_err
        ))),
        Err(_) => Err(AnalysisError::Timeout(timeout_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use image::{GrayImage, Rgb, RgbImage};
    use ptk_common::db::init::init_tables;
    use ptk_common::db::models::format_timestamp;

    /// Maps the top-left pixel's brightness to a plant code; a black
    /// corner stands in for a frame with no readable tag.
    struct CornerLocator;

    impl CodeLocator for CornerLocator {
        fn locate(&self, image: &GrayImage) -> Result<String, AnalysisError> {
            let v = image.get_pixel(0, 0)[0];
            if v < 10 {
                return Err(AnalysisError::NoQrCode);
            }
            Ok(format!("PLANT-{}", v / 100))
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        init_tables(&pool).await.unwrap();
        pool
    }

    fn test_settings() -> Arc<Settings> {
        let mut settings = Settings::default();
        settings.min_plant_area_px = 100;
        settings.min_component_area_px = 100;
        Arc::new(settings)
    }

    /// A white frame with a green square and a corner marker pixel
    fn write_plant_image(dir: &Path, name: &str, corner: u8) {
        let mut img = RgbImage::from_pixel(120, 120, Rgb([250, 250, 250]));
        for y in 30..90 {
            for x in 30..90 {
                img.put_pixel(x, y, Rgb([40, 180, 60]));
            }
        }
        img.put_pixel(0, 0, Rgb([corner, corner, corner]));
        img.save(dir.join(name)).unwrap();
    }

    #[tokio::test]
    async fn batch_continues_past_a_failing_image() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();

        write_plant_image(dir.path(), "a.png", 150); // PLANT-1
        write_plant_image(dir.path(), "b.png", 250); // PLANT-2
        write_plant_image(dir.path(), "c.png", 0); // no QR code

        let summary = run_batch(
            &pool,
            Arc::new(CornerLocator),
            test_settings(),
            dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(summary.images_processed, 2);
        assert_eq!(summary.plants_found, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].starts_with("c.png:"));
        assert!(summary.errors[0].contains("No QR code"));
    }

    #[tokio::test]
    async fn rerun_skips_already_analyzed_images() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        write_plant_image(dir.path(), "a.png", 150);

        let locator = Arc::new(CornerLocator);
        let first = run_batch(&pool, locator.clone(), test_settings(), dir.path())
            .await
            .unwrap();
        assert_eq!(first.images_processed, 1);

        let second = run_batch(&pool, locator, test_settings(), dir.path())
            .await
            .unwrap();
        assert_eq!(second.images_processed, 0);
        assert!(second.errors.is_empty());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn missing_directory_fails_the_batch() {
        let pool = test_pool().await;
        let result = run_batch(
            &pool,
            Arc::new(CornerLocator),
            test_settings(),
            Path::new("/nonexistent/images"),
        )
        .await;
        assert!(matches!(result, Err(ScanError::PathNotFound(_))));
    }

    #[tokio::test]
    async fn new_measurement_gets_a_growth_rate_against_history() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        write_plant_image(dir.path(), "a.png", 150); // PLANT-1

        // Seed a committed predecessor well in the past
        let plant = plants::resolve_plant(&pool, "PLANT-1").await.unwrap();
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        sqlx::query(
            "INSERT INTO images (plant_id, filename, filepath, captured_at, uploaded_at) \
             VALUES (?, 'old.png', '/old/old.png', ?, ?)",
        )
        .bind(plant.id)
        .bind(format_timestamp(past))
        .bind(format_timestamp(past))
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO measurements \
             (image_id, plant_id, area_px, mean_hue, mean_saturation, greenness_index, \
              health_score, is_overgrown, measured_at) \
             VALUES (1, ?, 1000, 120.0, 0.5, 0.5, 70.0, 0, ?)",
        )
        .bind(plant.id)
        .bind(format_timestamp(past))
        .execute(&pool)
        .await
        .unwrap();

        let summary = run_batch(
            &pool,
            Arc::new(CornerLocator),
            test_settings(),
            dir.path(),
        )
        .await
        .unwrap();
        assert_eq!(summary.images_processed, 1);

        let latest = measurements::latest_measurement(&pool, plant.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.area_px, 3600);
        // Both measurements are uncalibrated, so the rate is in pixel area per hour
        let rate = latest.growth_rate.expect("growth rate");
        assert!(rate > 0.0);
    }

    #[tokio::test]
    async fn uncalibrated_measurement_has_no_mm_fields() {
        let pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        write_plant_image(dir.path(), "a.png", 150);

        run_batch(&pool, Arc::new(CornerLocator), test_settings(), dir.path())
            .await
            .unwrap();

        let plant = plants::resolve_plant(&pool, "PLANT-1").await.unwrap();
        let latest = measurements::latest_measurement(&pool, plant.id)
            .await
            .unwrap()
            .unwrap();
        assert!(latest.area_mm2.is_none());
        assert!(latest.px_per_mm.is_none());
        assert!(!latest.is_overgrown);
    }
}
