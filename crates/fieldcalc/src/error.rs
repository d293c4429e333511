//! Error types for the fieldcalc facade

use thiserror::Error;

/// Result type for engine, storage and preset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the repository, store and preset layers
///
/// The engine's evaluation path never returns these: per-formula failures are soft, and a
/// repository failure degrades to an empty formula list.
#[derive(Debug, Error)]
pub enum Error {
    /// Formula model error (invalid expression, blank target, unknown id)
    #[error(transparent)]
    Core(#[from] fieldcalc_core::Error),

    /// CSV storage error
    #[cfg(feature = "csv")]
    #[error(transparent)]
    Csv(#[from] fieldcalc_csv::CsvError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Preset rejected; every problem found is listed
    #[error("Invalid preset: {}", .0.join("; "))]
    Preset(Vec<String>),

    /// Storage backend unavailable or inconsistent
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Error::Storage(msg.into())
    }
}
