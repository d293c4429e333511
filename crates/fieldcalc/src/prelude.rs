//! Prelude module - common imports for fieldcalc users
//!
//! ```rust
//! use fieldcalc::prelude::*;
//! ```

pub use crate::{
    // Engine
    EngineOptions,
    // Error types
    Error,
    FieldConfiguration,
    FieldType,
    FieldValue,
    FieldValues,
    // Main types
    Formula,
    FormulaDraft,
    FormulaEngine,
    FormulaIssue,
    // Storage traits
    FormulaRepository,
    FormulaStore,
    FormulaTestOutcome,
    MemoryFormulaStore,

    // Presets
    Preset,
    Result,
    ValidationError,
    ValidationOptions,
    CANNOT_COMPUTE_MESSAGE,
};

#[cfg(feature = "csv")]
pub use crate::CsvFormulaStore;
