//! Database access for PlantTrack
//!
//! Pool setup, logical schema, and record models shared by the services.

pub mod init;
pub mod models;

pub use init::init_database_pool;
