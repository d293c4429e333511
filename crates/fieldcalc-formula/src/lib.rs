//! # fieldcalc-formula
//!
//! Formula parser and evaluator for fieldcalc.
//!
//! This crate provides:
//! - Expression validation and field reference extraction (re-exported from core)
//! - Expression parsing (text → AST) over `+ - * / ( )`, numbers and `[Field]` references
//! - Expression evaluation against the current form values
//! - Dependency tracking between computed fields
//!
//! Evaluation never runs a general-purpose interpreter: the grammar above is all
//! there is.
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc_formula::{evaluate, FieldValue, FieldValues};
//!
//! let mut values = FieldValues::new();
//! values.insert("a".into(), FieldValue::from(10));
//! values.insert("b".into(), FieldValue::from(5));
//! values.insert("c".into(), FieldValue::from(2));
//!
//! assert_eq!(evaluate("[a] + [b] * [c]", &values), Some(20.0));
//! assert_eq!(evaluate("[a] / ([b] - 5)", &values), None);
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod parser;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use dependency::FieldDependencyGraph;
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, evaluate_ast, evaluate_with, try_evaluate, try_evaluate_with};
pub use parser::{parse_expression, parse_expression_with, MAX_NESTING_DEPTH, MAX_TREE_HEIGHT};

pub use fieldcalc_core::{
    extract_field_references, extract_unique_field_references, validate, validate_with,
    FieldValue, FieldValues, ValidationError, ValidationOptions,
};
