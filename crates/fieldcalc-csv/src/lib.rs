//! # fieldcalc-csv
//!
//! CSV reader and writer for the `formulas` table.
//!
//! Columns, in order: `id`, `department_id`, `target_field`, `formula_expression`,
//! `description`, `is_active`, `created_at`.

mod error;
mod options;
mod reader;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvReadOptions, CsvWriteOptions, LineTerminator};
pub use reader::CsvReader;
pub use writer::CsvWriter;

/// Column names of the formulas table
pub const COLUMNS: [&str; 7] = [
    "id",
    "department_id",
    "target_field",
    "formula_expression",
    "description",
    "is_active",
    "created_at",
];

/// Timestamp layout used by the `created_at` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
