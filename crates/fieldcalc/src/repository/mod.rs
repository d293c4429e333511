//! Formula storage
//!
//! The engine only needs the read path, [`FormulaRepository`]. Admin tooling (preset
//! import, the CLI) also writes through [`FormulaStore`].

#[cfg(feature = "csv")]
mod csv;
mod memory;

#[cfg(feature = "csv")]
pub use self::csv::CsvFormulaStore;
pub use memory::MemoryFormulaStore;

use crate::error::Result;
use fieldcalc_core::Formula;
use std::rc::Rc;
use std::sync::Arc;

/// Read access to a department's formulas
pub trait FormulaRepository {
    /// Active formulas of a department, ordered by id
    ///
    /// An unknown department yields an empty list, not an error.
    fn get_formulas_for_department(&self, department_id: i64) -> Result<Vec<Formula>>;
}

/// Write access to the formulas table
///
/// Writers validate expressions with the store's own options, so a formula built under
/// relaxed options may still be refused here.
pub trait FormulaStore: FormulaRepository {
    /// Store a new formula, returning it with its assigned id and creation time
    fn insert(&mut self, formula: Formula) -> Result<Formula>;

    /// Overwrite a stored formula, matched by id
    fn update(&mut self, formula: &Formula) -> Result<()>;

    /// Soft delete: keep the row, stop evaluating it
    fn deactivate(&mut self, id: i64) -> Result<()>;

    /// Look up a formula by id, active or not
    fn get(&self, id: i64) -> Result<Option<Formula>>;

    /// Look up a department's formula for a target field, active or not
    fn find_by_target(&self, department_id: i64, target_field: &str) -> Result<Option<Formula>>;
}

impl<R: FormulaRepository + ?Sized> FormulaRepository for &R {
    fn get_formulas_for_department(&self, department_id: i64) -> Result<Vec<Formula>> {
        (**self).get_formulas_for_department(department_id)
    }
}

impl<R: FormulaRepository + ?Sized> FormulaRepository for Box<R> {
    fn get_formulas_for_department(&self, department_id: i64) -> Result<Vec<Formula>> {
        (**self).get_formulas_for_department(department_id)
    }
}

impl<R: FormulaRepository + ?Sized> FormulaRepository for Rc<R> {
    fn get_formulas_for_department(&self, department_id: i64) -> Result<Vec<Formula>> {
        (**self).get_formulas_for_department(department_id)
    }
}

impl<R: FormulaRepository + ?Sized> FormulaRepository for Arc<R> {
    fn get_formulas_for_department(&self, department_id: i64) -> Result<Vec<Formula>> {
        (**self).get_formulas_for_department(department_id)
    }
}

/// Sort formulas by id; unsaved formulas keep their relative order at the end
fn sort_by_id(formulas: &mut [Formula]) {
    formulas.sort_by_key(|f| f.id().unwrap_or(i64::MAX));
}

/// Current local time, truncated to whole seconds as the table stores it
fn now() -> chrono::NaiveDateTime {
    use chrono::Timelike;
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
