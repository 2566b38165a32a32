use synergy_shared::SynergyError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The addressed record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A record with the same key already exists.
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Stored document or payload is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

impl From<StoreError> for SynergyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => SynergyError::NotFound(what),
            StoreError::Json(e) => SynergyError::Serialization(e.to_string()),
            other => SynergyError::Internal(other.to_string()),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
