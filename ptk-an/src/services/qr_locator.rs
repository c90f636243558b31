//! QR code identity resolution
//!
//! Decodes the plant-identifying payload from an image. Exactly one
//! distinct payload is required: zero is `NoQrCode`, more than one is
//! `AmbiguousQrCode` (reject rather than guess which tag applies).

use crate::error::AnalysisError;
use image::GrayImage;
use tracing::{debug, info};

/// Seam for the identity stage: production uses [`RqrrLocator`], tests
/// can substitute a stub that maps images to fixed codes.
pub trait CodeLocator: Send + Sync {
    /// Decode the single plant code from a grayscale frame
    fn locate(&self, image: &GrayImage) -> Result<String, AnalysisError>;
}

/// rqrr-backed locator with a one-step contrast-stretch retry for frames
/// where uneven lighting defeats the first pass.
pub struct RqrrLocator;

impl RqrrLocator {
    pub fn new() -> Self {
        Self
    }

    fn decode_payloads(image: &GrayImage) -> Vec<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            image.width() as usize,
            image.height() as usize,
            |x, y| image.get_pixel(x as u32, y as u32)[0],
        );

        let mut payloads = Vec::new();
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => payloads.push(content),
                Err(e) => debug!("QR grid decode failed: {:?}", e),
            }
        }
        payloads
    }
}

impl Default for RqrrLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeLocator for RqrrLocator {
    fn locate(&self, image: &GrayImage) -> Result<String, AnalysisError> {
        let mut payloads = Self::decode_payloads(image);

        if payloads.is_empty() {
            debug!("No QR payloads on first pass, retrying with contrast stretch");
            let stretched = stretch_contrast(image);
            payloads = Self::decode_payloads(&stretched);
        }

        let code = resolve_payloads(payloads)?;
        info!("QR code detected: {}", code);
        Ok(code)
    }
}

/// Reduce decoded payloads to the single plant code.
///
/// Payloads are trimmed; empty ones are discarded; duplicates of the same
/// code (a tag can decode from multiple grids) collapse to one.
pub fn resolve_payloads(payloads: Vec<String>) -> Result<String, AnalysisError> {
    let mut distinct: Vec<String> = Vec::new();
    for payload in payloads {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !distinct.iter().any(|c| c == trimmed) {
            distinct.push(trimmed.to_string());
        }
    }

    match distinct.len() {
        0 => Err(AnalysisError::NoQrCode),
        1 => Ok(distinct.remove(0)),
        _ => Err(AnalysisError::AmbiguousQrCode(distinct.join(", "))),
    }
}

/// Linear contrast stretch to the full 0-255 range
fn stretch_contrast(image: &GrayImage) -> GrayImage {
    let (mut lo, mut hi) = (u8::MAX, u8::MIN);
    for px in image.pixels() {
        lo = lo.min(px[0]);
        hi = hi.max(px[0]);
    }
    if hi <= lo {
        return image.clone();
    }

    let range = (hi - lo) as f32;
    let mut out = image.clone();
    for px in out.pixels_mut() {
        px[0] = (((px[0] - lo) as f32 / range) * 255.0).round() as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_payload_is_trimmed() {
        let code = resolve_payloads(vec!["  PLANT-7 \n".to_string()]).unwrap();
        assert_eq!(code, "PLANT-7");
    }

    #[test]
    fn no_payloads_is_no_qr_code() {
        assert!(matches!(
            resolve_payloads(vec![]),
            Err(AnalysisError::NoQrCode)
        ));
    }

    #[test]
    fn blank_payloads_count_as_none() {
        assert!(matches!(
            resolve_payloads(vec!["   ".to_string(), "".to_string()]),
            Err(AnalysisError::NoQrCode)
        ));
    }

    #[test]
    fn duplicate_payloads_collapse() {
        let code =
            resolve_payloads(vec!["PLANT-1".to_string(), "PLANT-1 ".to_string()]).unwrap();
        assert_eq!(code, "PLANT-1");
    }

    #[test]
    fn distinct_payloads_are_ambiguous() {
        let err =
            resolve_payloads(vec!["PLANT-1".to_string(), "PLANT-2".to_string()]).unwrap_err();
        match err {
            AnalysisError::AmbiguousQrCode(msg) => {
                assert!(msg.contains("PLANT-1"));
                assert!(msg.contains("PLANT-2"));
            }
            other => panic!("Expected AmbiguousQrCode, got {:?}", other),
        }
    }

    #[test]
    fn blank_frame_has_no_code() {
        let locator = RqrrLocator::new();
        let blank = GrayImage::from_pixel(64, 64, image::Luma([200u8]));
        assert!(matches!(
            locator.locate(&blank),
            Err(AnalysisError::NoQrCode)
        ));
    }

    #[test]
    fn contrast_stretch_expands_range() {
        let mut img = GrayImage::from_pixel(4, 1, image::Luma([100u8]));
        img.put_pixel(0, 0, image::Luma([120u8]));
        let stretched = stretch_contrast(&img);
        assert_eq!(stretched.get_pixel(0, 0)[0], 255);
        assert_eq!(stretched.get_pixel(1, 0)[0], 0);
    }
}
