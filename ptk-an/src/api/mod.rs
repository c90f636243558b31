//! HTTP API handlers for ptk-an

pub mod analysis;
pub mod health;
pub mod images;
pub mod plants;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use plants::plant_routes;
