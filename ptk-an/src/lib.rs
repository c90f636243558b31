//! ptk-an library - Plant Analysis service
//!
//! Turns periodic photographs of QR-tagged plant specimens into a
//! structured time series of growth and health measurements, and exposes
//! the persisted records over HTTP.

pub mod api;
pub mod db;
pub mod error;
pub mod services;
pub mod workflow;

pub use crate::error::{AnalysisError, ApiError, ApiResult};

use axum::http::{HeaderValue, Method};
use axum::Router;
use ptk_common::Settings;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::services::qr_locator::CodeLocator;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved configuration
    pub settings: Arc<Settings>,
    /// QR code locator used by the pipeline
    pub locator: Arc<dyn CodeLocator>,
    /// Serializes batch runs: plant histories must be observed in a
    /// consistent order, so only one batch may touch the database at a time
    pub analysis_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: Settings, locator: Arc<dyn CodeLocator>) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            locator,
            analysis_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);

    Router::new()
        .merge(api::health_routes())
        .merge(api::plant_routes())
        .merge(api::image_routes())
        .merge(api::analysis_routes())
        .layer(cors)
        .with_state(state)
}

/// CORS for the dashboard origins from configuration
fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
