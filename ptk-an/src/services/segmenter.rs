//! Plant segmentation
//!
//! Separates plant tissue from the background with an HSV band threshold
//! (green/brown hue range, minimum saturation and value), optionally
//! restricted by configured exclusion zones (QR label, ruler strip, color
//! chart). Connected components below the noise floor are dropped before
//! the area is counted. Color statistics are averaged over masked pixels
//! only.

use crate::error::AnalysisError;
use image::{GrayImage, RgbImage};
use ptk_common::Settings;
use tracing::{debug, info};

/// Output of the plant segmentation step
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Binary mask (0/255), same dimensions as the input
    pub mask: GrayImage,
    /// Number of plant pixels
    pub area_px: u64,
    /// Mean hue of masked pixels, degrees [0, 360)
    pub mean_hue: f64,
    /// Mean saturation of masked pixels, normalized [0, 1]
    pub mean_saturation: f64,
}

/// Segment the plant from the background.
///
/// Fails with `NoPlantDetected` when the cleaned mask falls below
/// `min_plant_area_px`.
pub fn segment_plant(image: &RgbImage, settings: &Settings) -> Result<Segmentation, AnalysisError> {
    let (w, h) = (image.width(), image.height());
    let mut mask = vec![false; (w * h) as usize];

    for (x, y, px) in image.enumerate_pixels() {
        if excluded(x, y, settings) {
            continue;
        }
        let (hue, sat, val) = rgb_to_hsv(px[0], px[1], px[2]);
        if hue >= settings.hue_lower_deg
            && hue <= settings.hue_upper_deg
            && sat >= settings.saturation_min
            && val >= settings.value_min
        {
            mask[(y * w + x) as usize] = true;
        }
    }

    remove_small_components(&mut mask, w, h, settings.min_component_area_px as usize);

    let area_px = mask.iter().filter(|&&m| m).count() as u64;
    if area_px < settings.min_plant_area_px as u64 {
        debug!("Segmentation failed: plant area {} px below minimum", area_px);
        return Err(AnalysisError::NoPlantDetected { area_px });
    }

    // Color statistics restricted to the mask
    let mut hue_sum = 0.0;
    let mut sat_sum = 0.0;
    for (x, y, px) in image.enumerate_pixels() {
        if mask[(y * w + x) as usize] {
            let (hue, sat, _) = rgb_to_hsv(px[0], px[1], px[2]);
            hue_sum += hue;
            sat_sum += sat;
        }
    }
    let mean_hue = hue_sum / area_px as f64;
    let mean_saturation = sat_sum / area_px as f64;

    info!(
        "Segmented plant: {} px, hue {:.1}, saturation {:.3}",
        area_px, mean_hue, mean_saturation
    );

    let mask_image = GrayImage::from_fn(w, h, |x, y| {
        image::Luma([if mask[(y * w + x) as usize] { 255 } else { 0 }])
    });

    Ok(Segmentation {
        mask: mask_image,
        area_px,
        mean_hue,
        mean_saturation,
    })
}

fn excluded(x: u32, y: u32, settings: &Settings) -> bool {
    settings.exclusion_zones.iter().any(|z| {
        x >= z.x && x < z.x + z.width && y >= z.y && y < z.y + z.height
    })
}

/// RGB (0-255) to HSV: hue in degrees [0, 360), saturation and value in [0, 1]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;

    let hue = if chroma == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / chroma).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / chroma + 2.0)
    } else {
        60.0 * ((r - g) / chroma + 4.0)
    };

    let saturation = if max == 0.0 { 0.0 } else { chroma / max };
    (hue, saturation, max)
}

/// Drop 8-connected components smaller than `min_area` pixels
fn remove_small_components(mask: &mut [bool], w: u32, h: u32, min_area: usize) {
    let (w, h) = (w as i64, h as i64);
    let mut visited = vec![false; mask.len()];
    let mut stack: Vec<(i64, i64)> = Vec::new();
    let mut component: Vec<usize> = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        component.clear();
        stack.push((start as i64 % w, start as i64 / w));
        visited[start] = true;

        while let Some((x, y)) = stack.pop() {
            let idx = (y * w + x) as usize;
            component.push(idx);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if mask[nidx] && !visited[nidx] {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }
        }

        if component.len() < min_area {
            for &idx in &component {
                mask[idx] = false;
            }
        }
    }
}
