//! In-memory formula store

use super::{now, sort_by_id, FormulaRepository, FormulaStore};
use crate::error::Result;
use fieldcalc_core::{validate_with, Error as CoreError, Formula, ValidationOptions};

/// Formula store held in memory
///
/// Ids are assigned in ascending order starting at 1 and are never reused.
#[derive(Debug, Clone)]
pub struct MemoryFormulaStore {
    formulas: Vec<Formula>,
    next_id: i64,
    validation: ValidationOptions,
}

impl Default for MemoryFormulaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFormulaStore {
    /// Create an empty store with strict validation
    pub fn new() -> Self {
        Self::with_validation(ValidationOptions::default())
    }

    /// Create an empty store that validates writes with the given options
    pub fn with_validation(validation: ValidationOptions) -> Self {
        Self {
            formulas: Vec::new(),
            next_id: 1,
            validation,
        }
    }

    /// Create a store holding the given formulas, assigning ids in order
    pub fn from_formulas<I>(formulas: I) -> Result<Self>
    where
        I: IntoIterator<Item = Formula>,
    {
        let mut store = Self::new();
        for formula in formulas {
            store.insert(formula)?;
        }
        Ok(store)
    }

    /// Number of stored formulas, inactive ones included
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// All stored formulas in id order
    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.iter()
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.formulas.iter().position(|f| f.id() == Some(id))
    }
}

impl FormulaRepository for MemoryFormulaStore {
    fn get_formulas_for_department(&self, department_id: i64) -> Result<Vec<Formula>> {
        let mut formulas: Vec<Formula> = self
            .formulas
            .iter()
            .filter(|f| f.department_id() == department_id && f.is_active())
            .cloned()
            .collect();
        sort_by_id(&mut formulas);
        Ok(formulas)
    }
}

impl FormulaStore for MemoryFormulaStore {
    fn insert(&mut self, mut formula: Formula) -> Result<Formula> {
        validate_with(formula.expression(), &self.validation).map_err(CoreError::from)?;

        let id = self.next_id;
        self.next_id += 1;
        formula.assign_id(id, Some(now()));

        log::debug!(
            "Stored formula {} for department {}: {} = {}",
            id,
            formula.department_id(),
            formula.target_field(),
            formula.expression()
        );
        self.formulas.push(formula.clone());
        Ok(formula)
    }

    fn update(&mut self, formula: &Formula) -> Result<()> {
        let id = formula.id().ok_or_else(|| CoreError::other("Formula has no id"))?;
        let idx = self.position(id).ok_or(CoreError::FormulaNotFound(id))?;
        validate_with(formula.expression(), &self.validation).map_err(CoreError::from)?;

        let created_at = self.formulas[idx].created_at();
        let mut updated = formula.clone();
        updated.assign_id(id, created_at);
        self.formulas[idx] = updated;
        Ok(())
    }

    fn deactivate(&mut self, id: i64) -> Result<()> {
        let idx = self.position(id).ok_or(CoreError::FormulaNotFound(id))?;
        self.formulas[idx].deactivate();
        Ok(())
    }

    fn get(&self, id: i64) -> Result<Option<Formula>> {
        Ok(self.position(id).map(|idx| self.formulas[idx].clone()))
    }

    fn find_by_target(&self, department_id: i64, target_field: &str) -> Result<Option<Formula>> {
        let target_field = target_field.trim();
        Ok(self
            .formulas
            .iter()
            .find(|f| f.department_id() == department_id && f.target_field() == target_field)
            .cloned())
    }
}
