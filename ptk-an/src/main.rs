//! ptk-an - Plant Analysis service
//!
//! Analyzes periodic photographs of QR-tagged plant specimens (identity,
//! calibration, segmentation, color/health metrics, growth tracking) and
//! serves the resulting time series to the dashboard.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use ptk_an::services::qr_locator::RqrrLocator;
use ptk_an::{build_router, AppState};
use ptk_common::Settings;

#[derive(Parser, Debug)]
#[command(name = "ptk-an", about = "PlantTrack analysis service")]
struct Args {
    /// Path to a TOML config file (overrides the platform default location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides configuration)
    #[arg(long)]
    port: Option<u16>,

    /// Image directory to analyze (overrides configuration)
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// SQLite database path (overrides configuration)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing before anything that can log
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting ptk-an (Plant Analysis) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(port) = args.port {
        settings.api_port = port;
    }
    if let Some(image_dir) = args.image_dir {
        settings.image_dir = image_dir;
    }
    if let Some(database) = args.database {
        settings.database_path = database;
    }

    info!("Image directory: {}", settings.image_dir.display());
    info!("Database: {}", settings.database_path.display());

    let pool = ptk_common::db::init_database_pool(&settings.database_path).await?;
    info!("Database connection established");

    let port = settings.api_port;
    let state = AppState::new(pool, settings, Arc::new(RqrrLocator::new()));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("ptk-an listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
