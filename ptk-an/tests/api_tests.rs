//! Integration tests for ptk-an API endpoints

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use image::GrayImage;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot` method

use ptk_an::db::images::{insert_image_and_measurement, NewImage, NewMeasurement};
use ptk_an::db::plants::resolve_plant;
use ptk_an::error::AnalysisError;
use ptk_an::services::qr_locator::CodeLocator;
use ptk_an::{build_router, AppState};
use ptk_common::db::init::init_tables;
use ptk_common::Settings;

struct FixedLocator(&'static str);

impl CodeLocator for FixedLocator {
    fn locate(&self, _image: &GrayImage) -> Result<String, AnalysisError> {
        Ok(self.0.to_string())
    }
}

/// Test helper: in-memory database with the full schema
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    init_tables(&pool).await.expect("schema");
    pool
}

/// Test helper: app with test state and a stub QR locator
fn setup_app(db: SqlitePool, settings: Settings) -> axum::Router {
    let state = AppState::new(db, settings, Arc::new(FixedLocator("PLANT-1")));
    build_router(state)
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

/// Seed one plant with an image and measurement; returns (plant_id, image_id)
async fn seed_measurement(pool: &SqlitePool, code: &str, filepath: &str) -> (i64, i64) {
    let plant = resolve_plant(pool, code).await.unwrap();
    let now = chrono::Utc::now();
    let (image_id, _) = insert_image_and_measurement(
        pool,
        &NewImage {
            plant_id: plant.id,
            filename: filepath.rsplit('/').next().unwrap().to_string(),
            filepath: filepath.to_string(),
            captured_at: now,
        },
        &NewMeasurement {
            plant_id: plant.id,
            area_px: 3600,
            area_mm2: Some(900.0),
            px_per_mm: Some(2.0),
            mean_hue: 118.0,
            mean_saturation: 0.6,
            greenness_index: 0.58,
            health_score: 76.5,
            growth_rate: None,
            is_overgrown: true,
            measured_at: now,
        },
    )
    .await
    .unwrap();
    (plant.id, image_id)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(setup_test_db().await, Settings::default());

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ptk-an");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_list_plants_empty() {
    let app = setup_app(setup_test_db().await, Settings::default());

    let response = app.oneshot(test_request("GET", "/api/plants")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_plants_with_summary() {
    let pool = setup_test_db().await;
    seed_measurement(&pool, "PLANT-1", "/photos/a.png").await;
    let app = setup_app(pool, Settings::default());

    let response = app.oneshot(test_request("GET", "/api/plants")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let plants = body.as_array().unwrap();
    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0]["code"], "PLANT-1");
    assert_eq!(plants[0]["image_count"], 1);
    assert_eq!(plants[0]["latest_area_mm2"], 900.0);
    assert_eq!(plants[0]["latest_is_overgrown"], true);
}

#[tokio::test]
async fn test_get_plant_detail() {
    let pool = setup_test_db().await;
    let (plant_id, _) = seed_measurement(&pool, "PLANT-1", "/photos/a.png").await;
    let app = setup_app(pool, Settings::default());

    let response = app
        .oneshot(test_request("GET", &format!("/api/plants/{}", plant_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "PLANT-1");
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert_eq!(body["measurements"].as_array().unwrap().len(), 1);
    assert_eq!(body["measurements"][0]["area_px"], 3600);
}

#[tokio::test]
async fn test_get_plant_not_found() {
    let app = setup_app(setup_test_db().await, Settings::default());

    let response = app
        .oneshot(test_request("GET", "/api/plants/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_measurements_for_unknown_plant_is_404() {
    let app = setup_app(setup_test_db().await, Settings::default());

    let response = app
        .oneshot(test_request("GET", "/api/plants/42/measurements"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_measurements() {
    let pool = setup_test_db().await;
    let (plant_id, _) = seed_measurement(&pool, "PLANT-1", "/photos/a.png").await;
    let app = setup_app(pool, Settings::default());

    let response = app
        .oneshot(test_request(
            "GET",
            &format!("/api/plants/{}/measurements", plant_id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let history = body.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["health_score"], 76.5);
    assert_eq!(history[0]["growth_rate"], Value::Null);
}

#[tokio::test]
async fn test_get_image_metadata() {
    let pool = setup_test_db().await;
    let (plant_id, image_id) = seed_measurement(&pool, "PLANT-1", "/photos/a.png").await;
    let app = setup_app(pool, Settings::default());

    let response = app
        .oneshot(test_request("GET", &format!("/api/images/{}", image_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["plant_id"], plant_id);
    assert_eq!(body["filename"], "a.png");
    assert_eq!(body["measurement"]["area_mm2"], 900.0);
}

#[tokio::test]
async fn test_get_image_not_found() {
    let app = setup_app(setup_test_db().await, Settings::default());

    let response = app
        .oneshot(test_request("GET", "/api/images/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_image_file_serves_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    image::RgbImage::from_pixel(8, 8, image::Rgb([40, 180, 60]))
        .save(&path)
        .unwrap();

    let pool = setup_test_db().await;
    seed_measurement(&pool, "PLANT-1", &path.to_string_lossy()).await;
    let app = setup_app(pool, Settings::default());

    let response = app
        .oneshot(test_request("GET", "/api/images/1/file"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/png"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..4], b"\x89PNG");
}

#[tokio::test]
async fn test_get_image_file_missing_on_disk_is_404() {
    let pool = setup_test_db().await;
    seed_measurement(&pool, "PLANT-1", "/photos/gone.png").await;
    let app = setup_app(pool, Settings::default());

    let response = app
        .oneshot(test_request("GET", "/api/images/1/file"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analyze_over_request_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut img = image::RgbImage::from_pixel(120, 120, image::Rgb([250, 250, 250]));
    for y in 30..90 {
        for x in 30..90 {
            img.put_pixel(x, y, image::Rgb([40, 180, 60]));
        }
    }
    img.save(dir.path().join("a.png")).unwrap();

    let mut settings = Settings::default();
    settings.min_plant_area_px = 100;
    settings.min_component_area_px = 100;
    let app = setup_app(setup_test_db().await, settings);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/analyze",
            json!({ "image_dir": dir.path().to_string_lossy() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["images_processed"], 1);
    assert_eq!(body["plants_found"], 1);
    assert_eq!(body["errors"], json!([]));
}

#[tokio::test]
async fn test_analyze_missing_directory_is_400() {
    let app = setup_app(setup_test_db().await, Settings::default());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/analyze",
            json!({ "image_dir": "/nonexistent/images" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}
