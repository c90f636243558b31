//! Common error type for the PlantTrack services
//!
//! Per-image analysis failures and HTTP error mapping live in `ptk-an`;
//! this enum covers the shared layers only (configuration, persistence,
//! record parsing).

use thiserror::Error;

/// Common result type for PlantTrack operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Query or connection failure against the SQLite store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (database directory, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied value rejected (empty plant code, malformed ROI)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data violates an expectation (bad timestamp text)
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = Error::InvalidInput("Plant code must be non-empty".to_string());
        assert_eq!(err.to_string(), "Invalid input: Plant code must be non-empty");

        let err = Error::Config("Parse planttrack.toml failed".to_string());
        assert!(err.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn sqlx_errors_convert() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
