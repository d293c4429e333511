//! Formula presets
//!
//! A preset is a JSON snapshot of a department's active formulas that can be imported
//! into the same or another department:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "exported_at": "2026-01-05T09:30:00",
//!   "department_id": 3,
//!   "data": {
//!     "formulas": [
//!       { "target_field": "total", "formula_expression": "[a] + [b]",
//!         "description": null, "is_active": true }
//!     ]
//!   }
//! }
//! ```
//!
//! Other sections under `data` (field configurations and so on) are ignored.

use crate::error::{Error, Result};
use crate::repository::{FormulaRepository, FormulaStore};
use chrono::NaiveDateTime;
use fieldcalc_core::{Formula, FormulaDraft, ValidationOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Preset format version written by [`export_preset`]
pub const PRESET_VERSION: &str = "1.0";

/// A department formula preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<NaiveDateTime>,
    /// Department the preset was exported from
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub data: Option<PresetData>,
}

/// The `data` section of a preset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetData {
    #[serde(default)]
    pub formulas: Vec<PresetFormula>,
}

/// One formula entry of a preset, unvalidated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetFormula {
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub formula_expression: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl From<&Formula> for PresetFormula {
    fn from(formula: &Formula) -> Self {
        Self {
            target_field: Some(formula.target_field().to_string()),
            formula_expression: Some(formula.expression().to_string()),
            description: formula.description().map(str::to_string),
            is_active: formula.is_active(),
        }
    }
}

impl PresetFormula {
    /// Build the entry into a formula of the given department
    fn to_formula(&self, department_id: i64, options: &ValidationOptions) -> Result<Formula> {
        let mut draft = FormulaDraft::new(
            department_id,
            self.target_field.clone().unwrap_or_default(),
            self.formula_expression.clone().unwrap_or_default(),
        )
        .with_active(self.is_active);
        draft.description = self.description.clone();
        Ok(draft.build_with(options)?)
    }
}

impl Preset {
    /// Formula entries, empty when the `data` section is missing
    pub fn formulas(&self) -> &[PresetFormula] {
        self.data.as_ref().map(|d| d.formulas.as_slice()).unwrap_or(&[])
    }

    /// Every problem that would stop this preset from importing
    pub fn validate(&self, options: &ValidationOptions) -> Vec<String> {
        let mut problems = Vec::new();

        if self.version.is_none() {
            problems.push("Missing 'version' field".to_string());
        }
        if self.data.is_none() {
            problems.push("Missing 'data' section".to_string());
        }

        for (idx, entry) in self.formulas().iter().enumerate() {
            let mut complete = true;
            if entry.target_field.is_none() {
                problems.push(format!("Formula {}: missing 'target_field'", idx));
                complete = false;
            }
            if entry.formula_expression.is_none() {
                problems.push(format!("Formula {}: missing 'formula_expression'", idx));
                complete = false;
            }
            if complete {
                if let Err(e) = entry.to_formula(0, options) {
                    problems.push(format!("Formula {}: {}", idx, e));
                }
            }
        }

        problems
    }

    /// Parse a preset from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the preset as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a preset from a JSON file
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the preset to a JSON file, replacing its contents
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Counts reported by [`import_preset`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Snapshot a department's active formulas
pub fn export_preset<R: FormulaRepository + ?Sized>(
    repository: &R,
    department_id: i64,
) -> Result<Preset> {
    let formulas = repository.get_formulas_for_department(department_id)?;
    log::info!(
        "Exporting {} formulas of department {}",
        formulas.len(),
        department_id
    );

    Ok(Preset {
        version: Some(PRESET_VERSION.to_string()),
        exported_at: Some(chrono::Local::now().naive_local()),
        department_id: Some(department_id),
        data: Some(PresetData {
            formulas: formulas.iter().map(PresetFormula::from).collect(),
        }),
    })
}

/// Import a preset into a department with strict validation
pub fn import_preset<S: FormulaStore + ?Sized>(
    store: &mut S,
    department_id: i64,
    preset: &Preset,
) -> Result<ImportSummary> {
    import_preset_with(store, department_id, preset, &ValidationOptions::default())
}

/// Import a preset into a department
///
/// The whole preset is validated first; if any entry is invalid nothing is written and
/// every problem is reported in [`Error::Preset`]. Entries are then matched to stored
/// formulas by target field: a match (active or not) is updated, anything else is
/// inserted.
pub fn import_preset_with<S: FormulaStore + ?Sized>(
    store: &mut S,
    department_id: i64,
    preset: &Preset,
    options: &ValidationOptions,
) -> Result<ImportSummary> {
    let problems = preset.validate(options);
    if !problems.is_empty() {
        return Err(Error::Preset(problems));
    }

    let mut summary = ImportSummary::default();

    for entry in preset.formulas() {
        let formula = entry.to_formula(department_id, options)?;

        match store.find_by_target(department_id, formula.target_field())? {
            Some(mut existing) => {
                existing.set_expression_with(formula.expression(), options)?;
                existing.set_description(formula.description().map(str::to_string));
                if formula.is_active() {
                    existing.activate();
                } else {
                    existing.deactivate();
                }
                store.update(&existing)?;
                summary.updated += 1;
            }
            None => {
                store.insert(formula)?;
                summary.inserted += 1;
            }
        }
    }

    log::info!(
        "Imported preset into department {}: {} inserted, {} updated",
        department_id,
        summary.inserted,
        summary.updated
    );
    Ok(summary)
}
