//! Formula expression validation
//!
//! Syntax checks applied to a formula expression before a [`Formula`](crate::Formula)
//! may exist. Validation is independent of field values; an expression that passes
//! here can still fail to compute later (missing input, division by zero, or operands
//! with no operator between them such as `[a] [b]`).
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc_core::{validate, ValidationError};
//!
//! assert!(validate("([a] + [b]) * 2").is_ok());
//! assert_eq!(validate("([a] + [b]"), Err(ValidationError::UnbalancedParentheses));
//! assert!(matches!(validate("[a] ++ [b]"), Err(ValidationError::RepeatedOperator(_))));
//! ```

use lazy_regex::{regex, regex_is_match};
use thiserror::Error;

/// Why an expression was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Expression is empty after trimming
    #[error("Formula expression must not be empty")]
    Empty,

    /// A `)` closes nothing, or a `(` is never closed
    #[error("Unbalanced parentheses in formula")]
    UnbalancedParentheses,

    /// Expression contains a character outside the formula grammar
    #[error("Formula contains invalid characters; only digits, + - * /, ( ), and [Field_Name] are allowed")]
    InvalidCharacters,

    /// A field reference has no name (`[]` or `[   ]`)
    #[error("Field reference must not be empty: []")]
    EmptyReference,

    /// Two or more operators in a row
    #[error("Formula contains an invalid operator sequence: '{0}'")]
    RepeatedOperator(String),

    /// Expression starts or ends with an operator
    #[error("Formula must not start or end with an operator")]
    LeadingOrTrailingOperator,
}

/// Options controlling how strict validation is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Accept `**` inside expressions (legacy exponentiation carve-out).
    ///
    /// Off by default, which rejects `[a]**[b]` as a repeated operator.
    pub allow_double_star: bool,
    /// Accept the empty reference `[]` (whitespace-only names are always rejected).
    pub allow_empty_references: bool,
}

impl ValidationOptions {
    /// Options matching formulas stored by older releases
    pub fn legacy() -> Self {
        Self {
            allow_double_star: true,
            allow_empty_references: true,
        }
    }
}

/// Validate an expression with the default (strict) options
pub fn validate(expression: &str) -> Result<(), ValidationError> {
    validate_with(expression, &ValidationOptions::default())
}

/// Validate an expression
///
/// Checks run in a fixed order and the first failure is reported: emptiness,
/// parenthesis balance, character set, empty references, repeated operators,
/// leading/trailing operators.
pub fn validate_with(expression: &str, options: &ValidationOptions) -> Result<(), ValidationError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(ValidationError::Empty);
    }

    if !has_balanced_parentheses(expression) {
        return Err(ValidationError::UnbalancedParentheses);
    }

    if !regex_is_match!(r"^[\d+\-*/()\[\]\s\w]+$", expression) {
        return Err(ValidationError::InvalidCharacters);
    }

    if regex!(r"\[([^\]]+)\]")
        .captures_iter(expression)
        .any(|caps| caps[1].trim().is_empty())
    {
        return Err(ValidationError::EmptyReference);
    }
    if !options.allow_empty_references && expression.contains("[]") {
        return Err(ValidationError::EmptyReference);
    }

    let scanned = if options.allow_double_star {
        expression.replace("**", "")
    } else {
        expression.to_string()
    };
    if let Some(run) = regex!(r"[+\-*/]{2,}").find(&scanned) {
        return Err(ValidationError::RepeatedOperator(run.as_str().to_string()));
    }

    if regex_is_match!(r"^[+\-*/]", expression) || regex_is_match!(r"[+\-*/]$", expression) {
        return Err(ValidationError::LeadingOrTrailingOperator);
    }

    Ok(())
}

/// Running open-count never goes negative and ends at zero
fn has_balanced_parentheses(expression: &str) -> bool {
    let mut depth = 0i64;
    for c in expression.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_expressions() {
        assert_eq!(validate("[a] + [b]"), Ok(()));
        assert_eq!(validate("([a]+[b])"), Ok(()));
        assert_eq!(validate("(([price] + [tax]) * [quantity]) - [discount]"), Ok(()));
        assert_eq!(validate("[subtotal] * (1 + [tax_rate] / 100)"), Ok(()));
        assert_eq!(validate("100 + 200"), Ok(()));
        assert_eq!(validate("  [Số lượng] * [Đơn giá]  "), Ok(()));
    }

    #[test]
    fn test_empty() {
        assert_eq!(validate(""), Err(ValidationError::Empty));
        assert_eq!(validate("   \t"), Err(ValidationError::Empty));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert_eq!(validate("([a]+[b]"), Err(ValidationError::UnbalancedParentheses));
        assert_eq!(validate("[a]+[b])"), Err(ValidationError::UnbalancedParentheses));
        assert_eq!(validate(")[a]("), Err(ValidationError::UnbalancedParentheses));
    }

    #[test]
    fn test_invalid_characters() {
        assert_eq!(validate("[a] % [b]"), Err(ValidationError::InvalidCharacters));
        assert_eq!(validate("[a] ^ 2"), Err(ValidationError::InvalidCharacters));
        assert_eq!(validate("[a] + 1.5"), Err(ValidationError::InvalidCharacters));
        assert_eq!(validate("__import__('os')"), Err(ValidationError::InvalidCharacters));
    }

    #[test]
    fn test_repeated_operator() {
        assert_eq!(
            validate("[a] ++ [b]"),
            Err(ValidationError::RepeatedOperator("++".into()))
        );
        assert_eq!(
            validate("[a] */ [b]"),
            Err(ValidationError::RepeatedOperator("*/".into()))
        );
        // Separated by whitespace is not a run
        assert_eq!(validate("[a] + -[b]"), Ok(()));
    }

    #[test]
    fn test_double_star_carve_out() {
        assert_eq!(
            validate("[a]**[b]"),
            Err(ValidationError::RepeatedOperator("**".into()))
        );

        let legacy = ValidationOptions::legacy();
        assert_eq!(validate_with("[a]**[b]", &legacy), Ok(()));
        // Only the literal pair is exempt
        assert!(validate_with("[a]***[b]", &legacy).is_ok());
        assert!(validate_with("[a]**+[b]", &legacy).is_ok());
        assert!(validate_with("[a]*+[b]", &legacy).is_err());
    }

    #[test]
    fn test_leading_trailing_operator() {
        assert_eq!(
            validate("+[a]"),
            Err(ValidationError::LeadingOrTrailingOperator)
        );
        assert_eq!(
            validate("[a] *"),
            Err(ValidationError::LeadingOrTrailingOperator)
        );
        assert_eq!(
            validate("-5 + [a]"),
            Err(ValidationError::LeadingOrTrailingOperator)
        );
    }

    #[test]
    fn test_empty_references() {
        assert_eq!(validate("[ ] + [b]"), Err(ValidationError::EmptyReference));
        assert_eq!(validate("[] + [b]"), Err(ValidationError::EmptyReference));

        let options = ValidationOptions {
            allow_empty_references: true,
            ..Default::default()
        };
        assert_eq!(validate_with("[] + [b]", &options), Ok(()));
        assert_eq!(
            validate_with("[  ] + [b]", &options),
            Err(ValidationError::EmptyReference)
        );
    }

    #[test]
    fn test_missing_operator_passes() {
        // Caught when the expression is computed, not here
        assert_eq!(validate("[a] [b]"), Ok(()));
    }

    proptest! {
        #[test]
        fn prop_unbalanced_never_validates(depth in 1usize..6, extra_close in proptest::bool::ANY) {
            let expr = if extra_close {
                format!("[a]{}", ")".repeat(depth))
            } else {
                format!("{}[a]", "(".repeat(depth))
            };
            prop_assert_eq!(validate(&expr), Err(ValidationError::UnbalancedParentheses));
        }

        #[test]
        fn prop_wrapped_in_parentheses_validates(depth in 0usize..8, name in "[a-z_]{1,12}") {
            let expr = format!("{}[{}] * 2{}", "(".repeat(depth), name, ")".repeat(depth));
            prop_assert_eq!(validate(&expr), Ok(()));
        }
    }
}
