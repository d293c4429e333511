//! Errors reading or writing a formulas table

use thiserror::Error;

pub type CsvResult<T> = std::result::Result<T, CsvError>;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV, such as a bad quote or an unreadable record
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A row whose cell cannot be converted to its column's type
    #[error("row {row}, column '{column}': {message}")]
    InvalidRow {
        /// 1-based line in the file, header included
        row: usize,
        column: &'static str,
        message: String,
    },
}

impl CsvError {
    /// Error for the cell at `column` (an index into [`COLUMNS`](crate::COLUMNS))
    pub(crate) fn invalid_row(row: usize, column: usize, message: impl Into<String>) -> Self {
        CsvError::InvalidRow {
            row,
            column: crate::COLUMNS.get(column).copied().unwrap_or("?"),
            message: message.into(),
        }
    }
}
