//! # fieldcalc-core
//!
//! Core data model for fieldcalc, the computed-field engine behind the
//! department record forms.
//!
//! This crate provides the fundamental types used throughout fieldcalc:
//! - [`Formula`] - A validated `(target_field, expression)` rule owned by a department
//! - [`FieldValue`] and [`FieldValues`] - Current form input, as entered by the user
//! - [`FieldConfiguration`] - The subset of a department's form schema formulas refer to
//! - [`validate`] and [`extract_field_references`] - Expression syntax checks
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc_core::Formula;
//!
//! let formula = Formula::new(1, "total_cost", "[gia_ca] + [khoan_luong]").unwrap();
//! assert_eq!(formula.field_references(), vec!["gia_ca", "khoan_luong"]);
//!
//! assert!(Formula::new(1, "total_cost", "[gia_ca] ++ [khoan_luong]").is_err());
//! ```

pub mod error;
pub mod field;
pub mod formula;
pub mod reference;
pub mod validation;
pub mod value;

// Re-exports for convenience
pub use error::{Error, Result};
pub use field::{FieldConfiguration, FieldType};
pub use formula::{Formula, FormulaDraft};
pub use reference::{extract_field_references, extract_unique_field_references};
pub use validation::{validate, validate_with, ValidationError, ValidationOptions};
pub use value::{FieldValue, FieldValues};

/// Maximum length of a formula's target field name
pub const MAX_TARGET_FIELD_LEN: usize = 100;
