//! Department formula engine
//!
//! Computes every derivable target field of a department from a snapshot of the form's
//! current values. Evaluation is all-or-nothing per formula: a formula that cannot be
//! computed is left out of the result and the form keeps the field's previous value.
//!
//! # Example
//!
//! ```rust
//! use fieldcalc::prelude::*;
//!
//! let mut store = MemoryFormulaStore::new();
//! store.insert(Formula::new(1, "total", "[price] + [tax]").unwrap()).unwrap();
//!
//! let engine = FormulaEngine::new(store);
//! let mut values = FieldValues::new();
//! values.insert("price".into(), 1000.into());
//! values.insert("tax".into(), 100.into());
//!
//! let results = engine.evaluate_all_formulas(1, &values);
//! assert_eq!(results.get("total"), Some(&1100.0));
//! ```

use crate::error::Result;
use crate::repository::FormulaRepository;
use fieldcalc_core::{
    extract_unique_field_references, validate_with, FieldConfiguration, FieldType, FieldValues,
    Formula, ValidationError, ValidationOptions,
};
use fieldcalc_formula::{evaluate_with, try_evaluate_with, FieldDependencyGraph, FormulaError};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Message reported by [`FormulaEngine::test_formula`] when a valid expression cannot be
/// computed with the sample values
pub const CANNOT_COMPUTE_MESSAGE: &str = "Cannot compute formula with the given values";

/// Options for the formula engine
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Syntax rules for tested expressions and for parsing stored ones
    pub validation: ValidationOptions,
}

impl EngineOptions {
    /// Options that keep legacy `**` formulas working
    pub fn legacy() -> Self {
        Self {
            validation: ValidationOptions::legacy(),
        }
    }
}

/// Outcome of testing an expression against sample values
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaTestOutcome {
    /// The expression is valid and computed to this value
    Computed(f64),
    /// The expression is not valid; the user has to fix it
    SyntaxError(ValidationError),
    /// The expression is valid but the sample values do not compute
    CannotCompute(FormulaError),
}

impl FormulaTestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FormulaTestOutcome::Computed(_))
    }

    pub fn result(&self) -> Option<f64> {
        match self {
            FormulaTestOutcome::Computed(value) => Some(*value),
            _ => None,
        }
    }

    /// Message to show the user, `None` on success
    ///
    /// Syntax errors give the validator's message. Evaluation failures all give
    /// [`CANNOT_COMPUTE_MESSAGE`].
    pub fn error_message(&self) -> Option<String> {
        match self {
            FormulaTestOutcome::Computed(_) => None,
            FormulaTestOutcome::SyntaxError(e) => Some(e.to_string()),
            FormulaTestOutcome::CannotCompute(_) => Some(CANNOT_COMPUTE_MESSAGE.to_string()),
        }
    }

    /// `(success, result, error_message)`
    pub fn into_parts(self) -> (bool, Option<f64>, Option<String>) {
        (self.is_success(), self.result(), self.error_message())
    }
}

/// A problem found by [`FormulaEngine::check_department`]
///
/// Issues are advisory: none of them stops a formula from being evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaIssue {
    /// A formula references a field the department does not define
    UnknownField { target_field: String, field: String },
    /// A formula references a field whose type holds no numbers
    NonNumericField {
        target_field: String,
        field: String,
        field_type: FieldType,
    },
    /// A computed field depends on itself
    CircularReference { field: String },
}

impl fmt::Display for FormulaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaIssue::UnknownField {
                target_field,
                field,
            } => write!(
                f,
                "Formula for '{}' references unknown field '{}'",
                target_field, field
            ),
            FormulaIssue::NonNumericField {
                target_field,
                field,
                field_type,
            } => write!(
                f,
                "Formula for '{}' references {} field '{}'",
                target_field, field_type, field
            ),
            FormulaIssue::CircularReference { field } => {
                write!(f, "Field '{}' is computed from itself", field)
            }
        }
    }
}

/// Computes a department's derived fields from its stored formulas
///
/// The engine holds no state besides its repository and options. Formulas are fetched
/// anew on every call, so edits are picked up immediately.
#[derive(Debug, Clone)]
pub struct FormulaEngine<R> {
    repository: R,
    options: EngineOptions,
}

impl<R: FormulaRepository> FormulaEngine<R> {
    /// Create an engine with default options
    pub fn new(repository: R) -> Self {
        Self::with_options(repository, EngineOptions::default())
    }

    /// Create an engine with custom options
    pub fn with_options(repository: R, options: EngineOptions) -> Self {
        Self {
            repository,
            options,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn into_repository(self) -> R {
        self.repository
    }

    /// Active formulas of a department in id order
    ///
    /// A storage failure is logged and yields an empty list.
    pub fn get_formulas_for_department(&self, department_id: i64) -> Vec<Formula> {
        match self.repository.get_formulas_for_department(department_id) {
            Ok(formulas) => formulas,
            Err(e) => {
                log::error!(
                    "Failed to load formulas for department {}: {}",
                    department_id,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Evaluate one formula, `None` if it cannot be computed
    pub fn evaluate_formula(&self, formula: &Formula, field_values: &FieldValues) -> Option<f64> {
        evaluate_with(
            formula.expression(),
            field_values,
            &self.options.validation,
        )
    }

    /// Evaluate every active formula of a department
    ///
    /// Formulas run in id order against `field_values` only; computed results are not fed
    /// into later formulas. Failed formulas are left out. When two formulas share a target
    /// field, the later successful one wins.
    pub fn evaluate_all_formulas(
        &self,
        department_id: i64,
        field_values: &FieldValues,
    ) -> HashMap<String, f64> {
        let mut results = HashMap::new();

        for formula in self.get_formulas_for_department(department_id) {
            match self.evaluate_formula(&formula, field_values) {
                Some(value) => {
                    results.insert(formula.target_field().to_string(), value);
                }
                None => log::debug!(
                    "Skipped '{}' for department {}",
                    formula.target_field(),
                    department_id
                ),
            }
        }

        results
    }

    /// Check an expression's syntax with the engine's rules
    pub fn validate_formula_syntax(
        &self,
        expression: &str,
    ) -> std::result::Result<(), ValidationError> {
        validate_with(expression, &self.options.validation)
    }

    /// Distinct fields a formula reads, in order of first appearance
    pub fn get_dependent_fields(&self, formula: &Formula) -> Vec<String> {
        extract_unique_field_references(formula.expression())
    }

    /// Try an expression against sample values
    ///
    /// Syntax is checked first, so a syntax error is reported even when the sample values
    /// are also unusable.
    pub fn test_formula(&self, expression: &str, test_values: &FieldValues) -> FormulaTestOutcome {
        if let Err(e) = self.validate_formula_syntax(expression) {
            return FormulaTestOutcome::SyntaxError(e);
        }

        match try_evaluate_with(expression, test_values, &self.options.validation) {
            Ok(value) => FormulaTestOutcome::Computed(value),
            Err(e) => {
                log::debug!("Test of '{}' failed: {}", expression, e);
                FormulaTestOutcome::CannotCompute(e)
            }
        }
    }

    /// Computed fields that may change when the given inputs change, in evaluation order
    pub fn affected_fields(&self, department_id: i64, changed: &[&str]) -> Vec<String> {
        let formulas = self.get_formulas_for_department(department_id);
        let targets: HashSet<&str> = formulas.iter().map(Formula::target_field).collect();
        let graph = FieldDependencyGraph::from_formulas(&formulas);

        graph
            .recalc_order(changed)
            .into_iter()
            .filter(|field| targets.contains(field.as_str()) && !changed.contains(&field.as_str()))
            .collect()
    }

    /// Check a department's formulas against its field configuration
    ///
    /// `fields` is the department's form schema; inactive entries and entries of other
    /// departments are ignored. A reference to another formula's target field counts as
    /// known. Unlike evaluation, a storage failure is returned to the caller.
    pub fn check_department(
        &self,
        department_id: i64,
        fields: &[FieldConfiguration],
    ) -> Result<Vec<FormulaIssue>> {
        let formulas = self.repository.get_formulas_for_department(department_id)?;

        let configured: HashMap<&str, FieldType> = fields
            .iter()
            .filter(|f| f.is_active && f.department_id == department_id)
            .map(|f| (f.field_name.as_str(), f.field_type))
            .collect();
        let targets: HashSet<&str> = formulas.iter().map(Formula::target_field).collect();

        let mut issues = Vec::new();
        for formula in &formulas {
            for field in extract_unique_field_references(formula.expression()) {
                match configured.get(field.as_str()) {
                    Some(field_type) if !field_type.is_numeric() => {
                        issues.push(FormulaIssue::NonNumericField {
                            target_field: formula.target_field().to_string(),
                            field,
                            field_type: *field_type,
                        });
                    }
                    Some(_) => {}
                    None if targets.contains(field.as_str()) => {}
                    None => issues.push(FormulaIssue::UnknownField {
                        target_field: formula.target_field().to_string(),
                        field,
                    }),
                }
            }
        }

        let graph = FieldDependencyGraph::from_formulas(&formulas);
        issues.extend(
            graph
                .circular_fields()
                .into_iter()
                .map(|field| FormulaIssue::CircularReference { field }),
        );

        Ok(issues)
    }
}
