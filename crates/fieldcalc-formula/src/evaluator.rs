//! Formula evaluator
//!
//! Computes an expression against the current form values. Every failure here is a
//! soft failure: [`evaluate`] returns `None`, and the caller leaves the target field as
//! it was. [`try_evaluate`] exposes the reason for logging and diagnostics.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::parser::parse_expression_with;
use fieldcalc_core::{extract_field_references, FieldValue, FieldValues, ValidationOptions};

/// Evaluate an expression, yielding `None` when it cannot be computed
///
/// Strict options are used, so `**` does not parse.
pub fn evaluate(expression: &str, field_values: &FieldValues) -> Option<f64> {
    evaluate_with(expression, field_values, &ValidationOptions::default())
}

/// Evaluate an expression with the given options, yielding `None` on failure
pub fn evaluate_with(
    expression: &str,
    field_values: &FieldValues,
    options: &ValidationOptions,
) -> Option<f64> {
    match try_evaluate_with(expression, field_values, options) {
        Ok(value) => Some(value),
        Err(e @ FormulaError::DivisionByZero) => {
            log::warn!("{} in formula: {}", e, expression);
            None
        }
        Err(
            e @ (FormulaError::MissingField(_) | FormulaError::NonNumericField { .. }),
        ) => {
            log::warn!("Formula '{}' not computed: {}", expression, e);
            None
        }
        Err(e) => {
            log::debug!("Formula '{}' not computed: {}", expression, e);
            None
        }
    }
}

/// Evaluate an expression with strict options, reporting why it failed
pub fn try_evaluate(expression: &str, field_values: &FieldValues) -> FormulaResult<f64> {
    try_evaluate_with(expression, field_values, &ValidationOptions::default())
}

/// Evaluate an expression, reporting why it failed
///
/// All referenced fields are resolved before the expression is parsed, so a missing
/// or non-numeric input is reported ahead of any syntax or arithmetic problem.
pub fn try_evaluate_with(
    expression: &str,
    field_values: &FieldValues,
    options: &ValidationOptions,
) -> FormulaResult<f64> {
    for name in extract_field_references(expression) {
        resolve_field(field_values, &name)?;
    }

    let ast = parse_expression_with(expression, options)?;
    evaluate_ast(&ast, field_values)
}

/// Evaluate a parsed expression
pub fn evaluate_ast(expr: &Expr, field_values: &FieldValues) -> FormulaResult<f64> {
    match expr {
        Expr::Number(n) => Ok(*n),

        Expr::Field(name) => resolve_field(field_values, name),

        Expr::UnaryOp { op, operand } => {
            let value = evaluate_ast(operand, field_values)?;
            Ok(match op {
                UnaryOperator::Negate => -value,
                UnaryOperator::Plus => value,
            })
        }

        Expr::BinaryOp { op, left, right } => {
            let left = evaluate_ast(left, field_values)?;
            let right = evaluate_ast(right, field_values)?;
            apply_binary(*op, left, right)
        }
    }
}

fn apply_binary(op: BinaryOperator, left: f64, right: f64) -> FormulaResult<f64> {
    match op {
        BinaryOperator::Add => Ok(left + right),
        BinaryOperator::Subtract => Ok(left - right),
        BinaryOperator::Multiply => Ok(left * right),
        BinaryOperator::Divide => {
            if right == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            Ok(left / right)
        }
        BinaryOperator::Power => {
            if left == 0.0 && right < 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            let result = left.powf(right);
            if result.is_nan() && !left.is_nan() && !right.is_nan() {
                return Err(FormulaError::Evaluation(format!(
                    "{} ** {} has no real result",
                    left, right
                )));
            }
            if result.is_infinite() && left.is_finite() && right.is_finite() {
                return Err(FormulaError::Evaluation(format!(
                    "{} ** {} overflows",
                    left, right
                )));
            }
            Ok(result)
        }
    }
}

/// Look up a field and coerce it to a finite number
fn resolve_field(field_values: &FieldValues, name: &str) -> FormulaResult<f64> {
    match field_values.get(name) {
        None | Some(FieldValue::Empty) => Err(FormulaError::MissingField(name.to_string())),
        Some(value) => value
            .as_number()
            .filter(|n| n.is_finite())
            .ok_or_else(|| FormulaError::NonNumericField {
                field: name.to_string(),
                value: value.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(pairs: &[(&str, FieldValue)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn nums(pairs: &[(&str, f64)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Number(*v)))
            .collect()
    }

    #[test]
    fn test_basic_arithmetic() {
        let v = nums(&[("price", 1000.0), ("tax", 100.0), ("count", 4.0)]);
        assert_eq!(evaluate("[price] + [tax]", &v), Some(1100.0));
        assert_eq!(evaluate("[price] - [tax]", &v), Some(900.0));
        assert_eq!(evaluate("[price] * [count]", &v), Some(4000.0));
        assert_eq!(evaluate("[price] / [count]", &v), Some(250.0));
    }

    #[test]
    fn test_operator_precedence() {
        let v = nums(&[("a", 10.0), ("b", 5.0), ("c", 2.0)]);
        assert_eq!(evaluate("[a] + [b] * [c]", &v), Some(20.0));
    }

    #[test]
    fn test_parentheses_grouping() {
        let v = nums(&[("a", 100.0), ("b", 10.0), ("c", 5.0)]);
        assert_eq!(evaluate("([a]+[b])*[c]", &v), Some(550.0));

        let v = nums(&[("a", 10.0), ("b", 20.0), ("c", 50.0), ("d", 30.0), ("e", 5.0)]);
        assert_eq!(evaluate("(([a] + [b]) * ([c] - [d])) / [e]", &v), Some(120.0));
    }

    #[test]
    fn test_integer_inputs_divide_as_floats() {
        let v = values(&[("a", 10.into()), ("b", 4.into())]);
        assert_eq!(evaluate("[a] / [b]", &v), Some(2.5));
    }

    #[test]
    fn test_division_by_zero() {
        let v = nums(&[("a", 100.0), ("b", 0.0)]);
        assert_eq!(evaluate("[a]/[b]", &v), None);
        assert_eq!(try_evaluate("[a]/[b]", &v), Err(FormulaError::DivisionByZero));
        assert_eq!(evaluate("[b]/[b]", &v), None);
    }

    #[test]
    fn test_missing_field() {
        let v = nums(&[("a", 1.0)]);
        assert_eq!(evaluate("[a]+[b]", &v), None);
        assert_eq!(
            try_evaluate("[a]+[b]", &v),
            Err(FormulaError::MissingField("b".into()))
        );

        let v = values(&[("a", 1.into()), ("b", FieldValue::Empty)]);
        assert_eq!(evaluate("[a]+[b]", &v), None);
    }

    #[test]
    fn test_missing_field_reported_before_division_by_zero() {
        let v = nums(&[("a", 1.0), ("zero", 0.0)]);
        assert_eq!(
            try_evaluate("[a] / [zero] + [b]", &v),
            Err(FormulaError::MissingField("b".into()))
        );
    }

    #[test]
    fn test_non_numeric_field() {
        let v = values(&[("price", 1000.into()), ("tax", "invalid".into())]);
        assert_eq!(evaluate("[price] + [tax]", &v), None);
        assert!(matches!(
            try_evaluate("[price] + [tax]", &v),
            Err(FormulaError::NonNumericField { .. })
        ));
    }

    #[test]
    fn test_non_finite_inputs() {
        let v = values(&[
            ("one", 1.into()),
            ("inf", "inf".into()),
            ("infinity", " Infinity ".into()),
            ("nan", "nan".into()),
            ("raw_nan", FieldValue::Number(f64::NAN)),
            ("raw_inf", FieldValue::Number(f64::NEG_INFINITY)),
        ]);
        for name in ["inf", "infinity", "nan", "raw_nan", "raw_inf"] {
            let expression = format!("[one] + [{}]", name);
            assert_eq!(evaluate(&expression, &v), None, "{}", name);
            assert!(matches!(
                try_evaluate(&expression, &v),
                Err(FormulaError::NonNumericField { ref field, .. }) if field == name
            ));
        }
    }

    #[test]
    fn test_numeric_text_and_booleans() {
        let v = values(&[("price", " 1500 ".into()), ("insured", true.into())]);
        assert_eq!(evaluate("[price] * [insured]", &v), Some(1500.0));
    }

    #[test]
    fn test_negative_values() {
        let v = nums(&[("income", 1000.0), ("expense", 1500.0), ("neg", -5.0)]);
        assert_eq!(evaluate("[income] - [expense]", &v), Some(-500.0));
        assert_eq!(evaluate("[income] - [neg]", &v), Some(1005.0));
        assert_eq!(evaluate("(-[neg]) * 2", &v), Some(10.0));
    }

    #[test]
    fn test_malformed_expression_is_soft_failure() {
        let v = nums(&[("a", 1.0), ("b", 2.0)]);
        assert_eq!(evaluate("[a] [b]", &v), None);
        assert_eq!(evaluate("[a] + b", &v), None);
        assert_eq!(evaluate("[a] ** [b]", &v), None);
    }

    #[test]
    fn test_legacy_power() {
        let v = nums(&[("a", 2.0), ("b", 10.0), ("zero", 0.0), ("neg", -8.0)]);
        let legacy = ValidationOptions::legacy();
        assert_eq!(evaluate_with("[a]**[b]", &v, &legacy), Some(1024.0));
        assert_eq!(evaluate_with("[a]**3**2", &v, &legacy), Some(512.0));
        assert_eq!(evaluate_with("[zero]**(-1)", &v, &legacy), None);
        assert_eq!(evaluate_with("[neg]**0.5", &v, &legacy), None);
    }

    #[test]
    fn test_deep_nesting_is_soft_failure() {
        let v = nums(&[("a", 1.0)]);
        let deep = format!("{}[a]{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(evaluate(&deep, &v), None);
        assert_eq!(
            try_evaluate(&deep, &v),
            Err(FormulaError::Parse("expression nested too deeply".into()))
        );

        let unary = format!("[a] + {}[a]", "- ".repeat(10_000));
        assert_eq!(evaluate(&unary, &v), None);

        let nested = format!("{}[a]{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(evaluate(&nested, &v), Some(1.0));
    }

    #[test]
    fn test_leading_zero_literal_is_soft_failure() {
        let v = nums(&[("a", 1.0)]);
        assert_eq!(evaluate("[a] + 05", &v), None);
        assert_eq!(evaluate("[a] + 0.5", &v), Some(1.5));
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(evaluate("100 + 200", &FieldValues::new()), Some(300.0));
    }

    #[test]
    fn test_small_and_large_numbers() {
        let v = nums(&[("a", 0.00001), ("b", 0.00002)]);
        let result = evaluate("[a] + [b]", &v).unwrap();
        assert!((result - 0.00003).abs() < 0.000001);

        let v = nums(&[("a", 999_999_999.0), ("b", 999_999_999.0)]);
        assert!(evaluate("[a] * [b]", &v).unwrap() > 0.0);
    }

    #[test]
    fn test_scenarios() {
        let v = values(&[
            ("gia_ca", 5_000_000.into()),
            ("khoan_luong", 1_000_000.into()),
            ("chi_phi_khac", 500_000.into()),
        ]);
        assert_eq!(
            evaluate("[gia_ca] + [khoan_luong] + [chi_phi_khac]", &v),
            Some(6_500_000.0)
        );

        let v = values(&[("price", 1_000_000.into()), ("discount_rate", 10.into())]);
        assert_eq!(
            evaluate("[price] - ([price] * [discount_rate] / 100)", &v),
            Some(900_000.0)
        );

        let v = values(&[("subtotal", 1_000_000.into()), ("tax_rate", 10.into())]);
        assert_eq!(
            evaluate("[subtotal] * (1 + [tax_rate] / 100)", &v),
            Some(1_100_000.0)
        );
    }

    proptest! {
        #[test]
        fn prop_evaluate_is_pure(a in -1e9f64..1e9, b in -1e9f64..1e9, c in -1e3f64..1e3) {
            let v = nums(&[("a", a), ("b", b), ("c", c)]);
            let expr = "([a] - [b]) * [c] / ([a] + 1)";
            let first = evaluate(expr, &v);
            let second = evaluate(expr, &v);
            prop_assert_eq!(first.map(f64::to_bits), second.map(f64::to_bits));
        }

        #[test]
        fn prop_precedence_matches_native(a in -1e6f64..1e6, b in -1e6f64..1e6, c in -1e6f64..1e6) {
            let v = nums(&[("a", a), ("b", b), ("c", c)]);
            prop_assert_eq!(evaluate("[a] + [b] * [c]", &v), Some(a + b * c));
            prop_assert_eq!(evaluate("[a] - [b] - [c]", &v), Some(a - b - c));
        }
    }
}
