//! Database pool initialization and schema creation

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Opens (or creates) the SQLite database at `db_path` and ensures the
/// logical schema exists. Safe to call repeatedly.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the plants / images / measurements tables if they don't exist
///
/// Invariants enforced here rather than in application code:
/// - `plants.code` is UNIQUE (one Plant per code, even under concurrent
///   first sightings)
/// - `images.filepath` is UNIQUE (re-submission detection)
/// - `measurements.image_id` is UNIQUE (at most one Measurement per Image)
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            display_name TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plant_id INTEGER NOT NULL REFERENCES plants(id),
            filename TEXT NOT NULL,
            filepath TEXT NOT NULL UNIQUE,
            captured_at TEXT NOT NULL,
            uploaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measurements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_id INTEGER NOT NULL UNIQUE REFERENCES images(id),
            plant_id INTEGER NOT NULL REFERENCES plants(id),
            area_px INTEGER NOT NULL,
            area_mm2 REAL,
            px_per_mm REAL,
            mean_hue REAL NOT NULL,
            mean_saturation REAL NOT NULL,
            greenness_index REAL NOT NULL,
            health_score REAL NOT NULL,
            growth_rate REAL,
            is_overgrown INTEGER NOT NULL DEFAULT 0,
            measured_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_images_plant ON images(plant_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_measurements_plant_time \
         ON measurements(plant_id, measured_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (plants, images, measurements)");

    Ok(())
}
