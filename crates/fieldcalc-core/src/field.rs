//! Department field configuration
//!
//! The dynamic input form of each department is described by a list of field
//! configurations. Formulas refer to these fields by name, but nothing enforces the
//! link: a formula naming a field that was removed simply stops computing.

use std::fmt;
use std::str::FromStr;

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    Text,
    Number,
    Currency,
    Date,
    Dropdown,
    Checkbox,
    Email,
    Phone,
    Textarea,
    Url,
}

impl FieldType {
    /// All field types, in display order
    pub const ALL: [FieldType; 10] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Currency,
        FieldType::Date,
        FieldType::Dropdown,
        FieldType::Checkbox,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Textarea,
        FieldType::Url,
    ];

    /// Name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Date => "date",
            FieldType::Dropdown => "dropdown",
            FieldType::Checkbox => "checkbox",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Textarea => "textarea",
            FieldType::Url => "url",
        }
    }

    /// Whether values of this type can feed a formula
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Currency)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let lower = s.trim().to_lowercase();
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| crate::Error::other(format!("Unknown field type: {}", s)))
    }
}

/// One field of a department's input form
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldConfiguration {
    pub id: Option<i64>,
    pub department_id: i64,
    pub field_name: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub display_order: u32,
    pub is_active: bool,
}

impl FieldConfiguration {
    /// Create an active, optional field
    pub fn new<S: Into<String>>(department_id: i64, field_name: S, field_type: FieldType) -> Self {
        Self {
            id: None,
            department_id,
            field_name: field_name.into().trim().to_string(),
            field_type,
            is_required: false,
            display_order: 0,
            is_active: true,
        }
    }

    /// Set the display order
    pub fn with_display_order(mut self, order: u32) -> Self {
        self.display_order = order;
        self
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}
