//! # fieldcalc
//!
//! Computed fields for department record forms.
//!
//! Each department defines formulas such as `total_cost = [gia_ca] + [khoan_luong]`.
//! While a user fills in a record, the form asks the [`FormulaEngine`] for every value it
//! can derive from what has been entered so far.
//!
//! ## Features
//!
//! - Formula validation and field reference extraction
//! - Safe arithmetic evaluation over `+ - * / ( )`, numbers and `[Field]` references
//! - Per-department orchestration with soft failures
//! - In-memory and CSV formula stores
//! - JSON preset export and import
//! - Admin diagnostics: unknown fields, non-numeric fields, circular references
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc::prelude::*;
//!
//! let engine = FormulaEngine::new(MemoryFormulaStore::new());
//!
//! let mut sample = FieldValues::new();
//! sample.insert("a".into(), FieldValue::from(100));
//! sample.insert("b".into(), FieldValue::from(0));
//!
//! let outcome = engine.test_formula("[a] / [b]", &sample);
//! assert!(!outcome.is_success());
//! assert_eq!(outcome.error_message().as_deref(), Some(CANNOT_COMPUTE_MESSAGE));
//! ```

pub mod engine;
pub mod error;
pub mod prelude;
pub mod preset;
pub mod repository;

pub use engine::{
    EngineOptions, FormulaEngine, FormulaIssue, FormulaTestOutcome, CANNOT_COMPUTE_MESSAGE,
};
pub use error::{Error, Result};
pub use preset::{
    export_preset, import_preset, import_preset_with, ImportSummary, Preset, PresetData,
    PresetFormula, PRESET_VERSION,
};
#[cfg(feature = "csv")]
pub use repository::CsvFormulaStore;
pub use repository::{FormulaRepository, FormulaStore, MemoryFormulaStore};

// Re-export core types
pub use fieldcalc_core::{
    FieldConfiguration, FieldType, FieldValue, FieldValues, Formula, FormulaDraft,
    ValidationError, ValidationOptions, MAX_TARGET_FIELD_LEN,
};

// Re-export formula operations
pub use fieldcalc_formula::{
    evaluate, evaluate_with, extract_field_references, extract_unique_field_references,
    parse_expression, try_evaluate, validate, validate_with, Expr, FieldDependencyGraph,
    FormulaError,
};

// Re-export CSV types
#[cfg(feature = "csv")]
pub use fieldcalc_csv::{CsvError, CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter};
