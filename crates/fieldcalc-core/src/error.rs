//! Error types for fieldcalc-core

use crate::validation::ValidationError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fieldcalc-core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Formula expression failed syntax validation
    #[error("Invalid formula: {0}")]
    InvalidFormula(#[from] ValidationError),

    /// Target field is empty or whitespace
    #[error("Target field must not be empty")]
    EmptyTargetField,

    /// Target field exceeds the maximum length
    #[error("Target field is too long ({0} characters, max: {max})", max = crate::MAX_TARGET_FIELD_LEN)]
    TargetFieldTooLong(usize),

    /// Formula with the given id does not exist
    #[error("Formula not found: {0}")]
    FormulaNotFound(i64),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// The validation failure, if this error came from expression validation
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            Error::InvalidFormula(e) => Some(e),
            _ => None,
        }
    }
}
