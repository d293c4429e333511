//! Formula rules
//!
//! A [`Formula`] computes one target field of a department's form from other fields.
//! Its expression is validated when the formula is built and again on every edit, so
//! a `Formula` value always holds a syntactically valid expression.

use crate::error::{Error, Result};
use crate::reference::extract_field_references;
use crate::validation::{validate_with, ValidationOptions};
use chrono::NaiveDateTime;

/// A validated computed-field rule owned by a department
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "FormulaDraft"))]
pub struct Formula {
    id: Option<i64>,
    department_id: i64,
    target_field: String,
    #[cfg_attr(feature = "serde", serde(rename = "formula_expression"))]
    expression: String,
    description: Option<String>,
    is_active: bool,
    created_at: Option<NaiveDateTime>,
}

impl Formula {
    /// Create an active, unsaved formula with strict validation
    pub fn new<T, E>(department_id: i64, target_field: T, expression: E) -> Result<Self>
    where
        T: Into<String>,
        E: Into<String>,
    {
        FormulaDraft::new(department_id, target_field, expression).build()
    }

    /// Persistence id, absent until the formula is stored
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Owning department
    pub fn department_id(&self) -> i64 {
        self.department_id
    }

    /// Field that receives the computed value
    pub fn target_field(&self) -> &str {
        &self.target_field
    }

    /// The arithmetic expression, trimmed
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at
    }

    /// Field names referenced by the expression, duplicates included
    pub fn field_references(&self) -> Vec<String> {
        extract_field_references(&self.expression)
    }

    /// Replace the expression, validating it first
    ///
    /// On failure the formula is left unchanged.
    pub fn set_expression<E: Into<String>>(&mut self, expression: E) -> Result<()> {
        self.set_expression_with(expression, &ValidationOptions::default())
    }

    /// Replace the expression using the given validation options
    pub fn set_expression_with<E: Into<String>>(
        &mut self,
        expression: E,
        options: &ValidationOptions,
    ) -> Result<()> {
        let expression = expression.into();
        validate_with(&expression, options)?;
        self.expression = expression.trim().to_string();
        Ok(())
    }

    /// Rename the target field
    pub fn set_target_field<T: Into<String>>(&mut self, target_field: T) -> Result<()> {
        self.target_field = checked_target_field(target_field.into())?;
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Soft delete: the formula stays stored but is no longer evaluated
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    /// Record the identity assigned by the storage layer
    pub fn assign_id(&mut self, id: i64, created_at: Option<NaiveDateTime>) {
        self.id = Some(id);
        if created_at.is_some() {
            self.created_at = created_at;
        }
    }

    /// Unvalidated copy of this formula's fields
    pub fn to_draft(&self) -> FormulaDraft {
        FormulaDraft {
            id: self.id,
            department_id: self.department_id,
            target_field: self.target_field.clone(),
            formula_expression: self.expression.clone(),
            description: self.description.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

/// Unvalidated formula fields, as typed into a form or read from storage
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaDraft {
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: Option<i64>,
    pub department_id: i64,
    pub target_field: String,
    pub formula_expression: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
    #[cfg_attr(feature = "serde", serde(default = "default_active"))]
    pub is_active: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub created_at: Option<NaiveDateTime>,
}

#[cfg(feature = "serde")]
fn default_active() -> bool {
    true
}

impl FormulaDraft {
    pub fn new<T, E>(department_id: i64, target_field: T, expression: E) -> Self
    where
        T: Into<String>,
        E: Into<String>,
    {
        Self {
            id: None,
            department_id,
            target_field: target_field.into(),
            formula_expression: expression.into(),
            description: None,
            is_active: true,
            created_at: None,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Validate with strict options and produce a [`Formula`]
    pub fn build(self) -> Result<Formula> {
        self.build_with(&ValidationOptions::default())
    }

    /// Validate with the given options and produce a [`Formula`]
    pub fn build_with(self, options: &ValidationOptions) -> Result<Formula> {
        let target_field = checked_target_field(self.target_field)?;
        validate_with(&self.formula_expression, options)?;

        Ok(Formula {
            id: self.id,
            department_id: self.department_id,
            target_field,
            expression: self.formula_expression.trim().to_string(),
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<FormulaDraft> for Formula {
    type Error = Error;

    fn try_from(draft: FormulaDraft) -> Result<Self> {
        draft.build()
    }
}

fn checked_target_field(target_field: String) -> Result<String> {
    let trimmed = target_field.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyTargetField);
    }
    let len = trimmed.chars().count();
    if len > crate::MAX_TARGET_FIELD_LEN {
        return Err(Error::TargetFieldTooLong(len));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    #[test]
    fn test_new_formula() {
        let formula = Formula::new(3, "  total ", "  [price] + [tax] ").unwrap();
        assert_eq!(formula.department_id(), 3);
        assert_eq!(formula.target_field(), "total");
        assert_eq!(formula.expression(), "[price] + [tax]");
        assert!(formula.is_active());
        assert_eq!(formula.id(), None);
        assert_eq!(formula.field_references(), vec!["price", "tax"]);
    }

    #[test]
    fn test_invalid_formula_is_rejected() {
        let err = Formula::new(1, "total", "([price] + [tax]").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidFormula(ValidationError::UnbalancedParentheses)
        );
        assert_eq!(
            err.validation_error(),
            Some(&ValidationError::UnbalancedParentheses)
        );
    }

    #[test]
    fn test_blank_target_field() {
        assert_eq!(
            Formula::new(1, "   ", "[a]").unwrap_err(),
            Error::EmptyTargetField
        );
        let long = "x".repeat(101);
        assert_eq!(
            Formula::new(1, long, "[a]").unwrap_err(),
            Error::TargetFieldTooLong(101)
        );
    }

    #[test]
    fn test_edit_revalidates() {
        let mut formula = Formula::new(1, "total", "[a] + [b]").unwrap();

        assert!(formula.set_expression("[a] ** [b]").is_err());
        assert_eq!(formula.expression(), "[a] + [b]");

        formula.set_expression("[a] * [b]").unwrap();
        assert_eq!(formula.expression(), "[a] * [b]");

        formula
            .set_expression_with("[a]**[b]", &ValidationOptions::legacy())
            .unwrap();
        assert_eq!(formula.expression(), "[a]**[b]");

        assert!(formula.set_target_field("").is_err());
        assert_eq!(formula.target_field(), "total");
    }

    #[test]
    fn test_soft_delete() {
        let mut formula = Formula::new(1, "total", "[a]").unwrap();
        formula.deactivate();
        assert!(!formula.is_active());
        formula.activate();
        assert!(formula.is_active());
    }

    #[test]
    fn test_draft_round_trip() {
        let formula = FormulaDraft::new(2, "net", "[gross] - [discount]")
            .with_description("Net amount")
            .build()
            .unwrap();
        let rebuilt = formula.to_draft().build().unwrap();
        assert_eq!(rebuilt, formula);
        assert_eq!(rebuilt.description(), Some("Net amount"));
    }
}
