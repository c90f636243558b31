//! # PlantTrack Common Library
//!
//! Shared code for the PlantTrack services including:
//! - Database pool setup and logical schema
//! - Record models (plants, images, measurements)
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use config::Settings;
pub use error::{Error, Result};
