//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while parsing or computing a formula
///
/// None of these reach the engine's callers: [`evaluate`](crate::evaluate) folds them
/// all into "no result".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Expression parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Referenced field has no value
    #[error("Field '{0}' has no value")]
    MissingField(String),

    /// Referenced field's value is not a number
    #[error("Field '{field}' has non-numeric value: {value}")]
    NonNumericField { field: String, value: String },

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Any other evaluation failure
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}
