//! CSV-backed formula store

use super::{now, sort_by_id, FormulaRepository, FormulaStore};
use crate::error::Result;
use fieldcalc_core::{validate_with, Error as CoreError, Formula, FormulaDraft, ValidationOptions};
use fieldcalc_csv::{CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter};
use std::path::{Path, PathBuf};

/// Formula store kept in a CSV file
///
/// The file is read on every call, so edits made by other processes are seen by the next
/// read. Writes rewrite the whole file. A missing file is an empty table.
///
/// Rows whose expression or target field no longer validate are logged and skipped when
/// listing, but they are kept intact when the file is rewritten.
#[derive(Debug, Clone)]
pub struct CsvFormulaStore {
    path: PathBuf,
    read_options: CsvReadOptions,
    write_options: CsvWriteOptions,
    validation: ValidationOptions,
}

impl CsvFormulaStore {
    /// Create a store over the given file with default CSV options and strict validation
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            read_options: CsvReadOptions::default(),
            write_options: CsvWriteOptions::default(),
            validation: ValidationOptions::default(),
        }
    }

    /// Use custom CSV dialect options
    pub fn with_csv_options(mut self, read: CsvReadOptions, write: CsvWriteOptions) -> Self {
        self.read_options = read;
        self.write_options = write;
        self
    }

    /// Validate stored and written expressions with the given options
    pub fn with_validation(mut self, validation: ValidationOptions) -> Self {
        self.validation = validation;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<FormulaDraft>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Ok(CsvReader::read_file(&self.path, &self.read_options)?)
    }

    fn save(&self, rows: &[FormulaDraft]) -> Result<()> {
        CsvWriter::write_file(rows, &self.path, &self.write_options)?;
        Ok(())
    }

    fn build(&self, row: FormulaDraft) -> Result<Formula> {
        Ok(row.build_with(&self.validation)?)
    }
}

impl FormulaRepository for CsvFormulaStore {
    fn get_formulas_for_department(&self, department_id: i64) -> Result<Vec<Formula>> {
        let mut formulas = Vec::new();
        for row in self.load()? {
            if row.department_id != department_id || !row.is_active {
                continue;
            }
            let id = row.id;
            match row.build_with(&self.validation) {
                Ok(formula) => formulas.push(formula),
                Err(e) => log::warn!(
                    "Skipping stored formula {:?} of department {}: {}",
                    id,
                    department_id,
                    e
                ),
            }
        }
        sort_by_id(&mut formulas);
        Ok(formulas)
    }
}

impl FormulaStore for CsvFormulaStore {
    fn insert(&mut self, formula: Formula) -> Result<Formula> {
        validate_with(formula.expression(), &self.validation).map_err(CoreError::from)?;

        let mut rows = self.load()?;
        let id = rows.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;

        let mut formula = formula;
        formula.assign_id(id, Some(now()));
        rows.push(formula.to_draft());
        self.save(&rows)?;

        log::debug!(
            "Stored formula {} for department {} in {}",
            id,
            formula.department_id(),
            self.path.display()
        );
        Ok(formula)
    }

    fn update(&mut self, formula: &Formula) -> Result<()> {
        let id = formula.id().ok_or_else(|| CoreError::other("Formula has no id"))?;
        validate_with(formula.expression(), &self.validation).map_err(CoreError::from)?;

        let mut rows = self.load()?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == Some(id))
            .ok_or(CoreError::FormulaNotFound(id))?;

        let created_at = row.created_at;
        *row = formula.to_draft();
        if row.created_at.is_none() {
            row.created_at = created_at;
        }
        self.save(&rows)
    }

    fn deactivate(&mut self, id: i64) -> Result<()> {
        let mut rows = self.load()?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == Some(id))
            .ok_or(CoreError::FormulaNotFound(id))?;
        row.is_active = false;
        self.save(&rows)
    }

    fn get(&self, id: i64) -> Result<Option<Formula>> {
        self.load()?
            .into_iter()
            .find(|r| r.id == Some(id))
            .map(|row| self.build(row))
            .transpose()
    }

    fn find_by_target(&self, department_id: i64, target_field: &str) -> Result<Option<Formula>> {
        let target_field = target_field.trim();
        self.load()?
            .into_iter()
            .find(|r| r.department_id == department_id && r.target_field.trim() == target_field)
            .map(|row| self.build(row))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CsvFormulaStore {
        CsvFormulaStore::new(dir.path().join("formulas.csv"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.get_formulas_for_department(1).unwrap().is_empty());
        assert_eq!(store.get(1).unwrap(), None);
    }

    #[test]
    fn test_insert_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let total = store.insert(Formula::new(1, "total", "[a] + [b]").unwrap()).unwrap();
        store.insert(Formula::new(2, "other", "[a]").unwrap()).unwrap();
        store.insert(Formula::new(1, "net", "[total] - [fee]").unwrap()).unwrap();

        assert_eq!(total.id(), Some(1));

        // A second handle sees the same file
        let reader = store_in(&dir);
        let formulas = reader.get_formulas_for_department(1).unwrap();
        let ids: Vec<Option<i64>> = formulas.iter().map(Formula::id).collect();
        assert_eq!(ids, vec![Some(1), Some(3)]);
        assert_eq!(formulas[0], total);
    }

    #[test]
    fn test_update_and_deactivate() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let mut formula = store.insert(Formula::new(1, "total", "[a] + [b]").unwrap()).unwrap();

        formula.set_expression("[a] - [b]").unwrap();
        store.update(&formula).unwrap();
        assert_eq!(store.get(1).unwrap().unwrap().expression(), "[a] - [b]");

        store.deactivate(1).unwrap();
        assert!(store.get_formulas_for_department(1).unwrap().is_empty());
        assert!(!store.find_by_target(1, "total").unwrap().unwrap().is_active());
    }

    #[test]
    fn test_invalid_rows_are_skipped_and_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("formulas.csv");
        std::fs::write(
            &path,
            "id,department_id,target_field,formula_expression,description,is_active,created_at\n\
             1,1,broken,[a] ++ [b],,1,\n\
             2,1,total,[a] + [b],,1,\n",
        )
        .unwrap();

        let mut store = CsvFormulaStore::new(&path);
        let formulas = store.get_formulas_for_department(1).unwrap();
        assert_eq!(formulas.len(), 1);
        assert_eq!(formulas[0].target_field(), "total");

        store.deactivate(2).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[a] ++ [b]"));
    }

    #[test]
    fn test_failed_save_keeps_stored_formulas() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.insert(Formula::new(1, "total", "[a] + [b]").unwrap()).unwrap();
        store.insert(Formula::new(1, "net", "[total] - [fee]").unwrap()).unwrap();

        // Saving through a path whose parent is a file cannot succeed
        let blocked = CsvFormulaStore::new(dir.path().join("formulas.csv").join("nested.csv"));
        assert!(blocked.save(&[]).is_err());

        assert_eq!(store.get_formulas_for_department(1).unwrap().len(), 2);
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
