//! Analysis services
//!
//! Each stage of the per-image pipeline lives in its own module:
//! directory scanning, QR identity, ruler calibration, segmentation,
//! metric derivation, and growth tracking.

pub mod calibrator;
pub mod growth;
pub mod image_scanner;
pub mod metrics;
pub mod qr_locator;
pub mod segmenter;
