//! Ruler-based size calibration
//!
//! Detects evenly spaced ruler tick marks and derives a pixel-to-mm
//! scale factor. Strategy:
//! 1. Optionally crop to a configured ruler ROI.
//! 2. Collapse the region to 1-D mean-intensity profiles along both axes.
//! 3. Smooth, invert (dark ticks become peaks), find prominent peaks.
//! 4. Take the median spacing of consecutive ticks, discard outliers,
//!    and divide by the known physical tick distance.
//!
//! Failure to find an unambiguous tick pattern is reported as `None`,
//! not an error: downstream metrics fall back to pixel units.

use image::GrayImage;
use ptk_common::config::Roi;
use tracing::{debug, info};

/// Result of the ruler calibration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Scale factor: pixels per physical millimeter
    pub px_per_mm: f64,
    /// Number of tick marks detected along the winning axis
    pub tick_count: usize,
    /// Median spacing between consecutive ticks, in pixels
    pub median_tick_spacing_px: f64,
}

/// Detect a ruler and compute the pixel-to-mm conversion factor.
///
/// Tries both orientations and keeps the one with more consistent ticks;
/// vertical tick marks on a horizontal ruler would otherwise dominate.
pub fn calibrate_from_ruler(
    image: &GrayImage,
    tick_distance_mm: f64,
    roi: Option<Roi>,
) -> Option<Calibration> {
    let region = match roi {
        Some(r) => crop(image, r)?,
        None => image.clone(),
    };
    if region.width() < 3 || region.height() < 3 {
        return None;
    }

    let horizontal = find_tick_spacing(&column_profile(&region), tick_distance_mm);
    let vertical = find_tick_spacing(&row_profile(&region), tick_distance_mm);

    let best = match (horizontal, vertical) {
        (Some(h), Some(v)) => Some(if h.tick_count >= v.tick_count { h } else { v }),
        (Some(h), None) => Some(h),
        (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    if let Some(cal) = best {
        info!(
            "Ruler calibration: {} ticks, median spacing {:.1} px, {:.2} px/mm",
            cal.tick_count, cal.median_tick_spacing_px, cal.px_per_mm
        );
    } else {
        debug!("No consistent ruler tick pattern found");
    }
    best
}

/// Mean intensity per column (profile along the x axis)
fn column_profile(image: &GrayImage) -> Vec<f64> {
    let (w, h) = (image.width(), image.height());
    let mut profile = vec![0.0; w as usize];
    for y in 0..h {
        for x in 0..w {
            profile[x as usize] += image.get_pixel(x, y)[0] as f64;
        }
    }
    for v in &mut profile {
        *v /= h as f64;
    }
    profile
}

/// Mean intensity per row (profile along the y axis)
fn row_profile(image: &GrayImage) -> Vec<f64> {
    let (w, h) = (image.width(), image.height());
    let mut profile = vec![0.0; h as usize];
    for y in 0..h {
        for x in 0..w {
            profile[y as usize] += image.get_pixel(x, y)[0] as f64;
        }
    }
    for v in &mut profile {
        *v /= w as f64;
    }
    profile
}

/// Find evenly spaced dark tick marks in a 1-D intensity profile
pub fn find_tick_spacing(profile: &[f64], tick_distance_mm: f64) -> Option<Calibration> {
    if profile.len() < 16 || tick_distance_mm <= 0.0 {
        return None;
    }

    // Smooth, then invert so dark ticks become peaks
    let kernel = (profile.len() / 100).max(3) | 1;
    let smoothed = box_smooth(profile, kernel);
    let max = smoothed.iter().cloned().fold(f64::MIN, f64::max);
    let min = smoothed.iter().cloned().fold(f64::MAX, f64::min);
    if max <= min {
        return None;
    }
    let inverted: Vec<f64> = smoothed.iter().map(|v| max - v).collect();

    let min_distance = (profile.len() / 150).max(5);
    let min_prominence = (max - min) * 0.15;
    let peaks = find_peaks(&inverted, min_distance, min_prominence);

    if peaks.len() < 3 {
        debug!(
            "Too few tick marks detected ({}) for reliable calibration",
            peaks.len()
        );
        return None;
    }

    // Spacings between consecutive peaks, filtered to within 40% of median
    let spacings: Vec<f64> = peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let median_spacing = median(&spacings);
    let inliers: Vec<f64> = spacings
        .iter()
        .cloned()
        .filter(|s| (s - median_spacing).abs() < 0.4 * median_spacing)
        .collect();
    if inliers.len() < 2 {
        debug!("Tick spacings too inconsistent for calibration");
        return None;
    }

    let refined = median(&inliers);
    if refined <= 0.0 {
        return None;
    }

    Some(Calibration {
        px_per_mm: refined / tick_distance_mm,
        tick_count: peaks.len(),
        median_tick_spacing_px: refined,
    })
}

/// Box filter with odd window size, edges clamped
fn box_smooth(profile: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let n = profile.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let sum: f64 = profile[lo..hi].iter().sum();
        out.push(sum / (hi - lo) as f64);
    }
    out
}

/// Local maxima with a prominence floor and a minimum mutual distance.
///
/// Prominence is measured against the lowest saddle on the way to the
/// nearest higher terrain on each side. Taller peaks win distance
/// conflicts. Returned indices are sorted ascending.
fn find_peaks(values: &[f64], min_distance: usize, min_prominence: f64) -> Vec<usize> {
    let n = values.len();
    let mut candidates: Vec<usize> = Vec::new();
    for i in 1..n.saturating_sub(1) {
        if values[i] > values[i - 1] && values[i] >= values[i + 1] {
            candidates.push(i);
        }
    }

    let mut prominent: Vec<(usize, f64)> = Vec::new();
    for &i in &candidates {
        if prominence(values, i) >= min_prominence {
            prominent.push((i, values[i]));
        }
    }

    // Greedy distance suppression, tallest first
    prominent.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<usize> = Vec::new();
    for (i, _) in prominent {
        if kept.iter().all(|&k| k.abs_diff(i) >= min_distance) {
            kept.push(i);
        }
    }
    kept.sort_unstable();
    kept
}

/// Height of `values[peak]` above the higher of the two bounding saddles
fn prominence(values: &[f64], peak: usize) -> f64 {
    let height = values[peak];

    let mut left_min = height;
    for i in (0..peak).rev() {
        if values[i] > height {
            break;
        }
        left_min = left_min.min(values[i]);
    }

    let mut right_min = height;
    for &v in &values[peak + 1..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Crop to the ROI, clamped to image bounds; None when empty
fn crop(image: &GrayImage, roi: Roi) -> Option<GrayImage> {
    let x = roi.x.min(image.width());
    let y = roi.y.min(image.height());
    let w = roi.width.min(image.width() - x);
    let h = roi.height.min(image.height() - y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(image, x, y, w, h).to_image())
}
