//! Binary and unary operator semantics
//!
//! Custom operators registered on the environment are consulted by
//! symbol before the built-in semantics. `and`/`or`/`??` short-circuit
//! in the evaluator and only fall through here when a custom operator
//! overrides them.

use crate::config::constants::render::CONTAINMENT_HASH_THRESHOLD;
use crate::grammar::{BinaryOp, UnaryOp};
use crate::runtime::environment::Environment;
use crate::runtime::error::{RenderError, RenderResult};
use crate::runtime::value::{Number, Value};
use crate::utils::Span;
use std::collections::HashSet;

/// Apply a binary operator to two evaluated operands
pub fn binary(
    env: &Environment,
    op: BinaryOp,
    left: &Value,
    right: &Value,
    span: Span,
) -> RenderResult<Value> {
    if let Some(custom) = env.operator(op.symbol()) {
        return custom(left, right);
    }

    match op {
        BinaryOp::Add => add(left, right, span),
        BinaryOp::Sub => arithmetic(left, right, span, "-", |a, b| Ok(Number::Int(a.wrapping_sub(b))), |a, b| a - b),
        BinaryOp::Mul => arithmetic(left, right, span, "*", |a, b| Ok(Number::Int(a.wrapping_mul(b))), |a, b| a * b),
        BinaryOp::Div => divide(left, right, span),
        BinaryOp::Mod => modulo(left, right, span),
        BinaryOp::Pow => power(left, right, span),
        BinaryOp::Concat => {
            let mut out = left.render_string();
            right.render_into(&mut out);
            Ok(Value::string(out))
        }
        BinaryOp::Eq => Ok(Value::Bool(left.loose_eq(right))),
        BinaryOp::Ne => Ok(Value::Bool(!left.loose_eq(right))),
        BinaryOp::Lt => ordered(left, right, span, |ord| ord == std::cmp::Ordering::Less),
        BinaryOp::Le => ordered(left, right, span, |ord| ord != std::cmp::Ordering::Greater),
        BinaryOp::Gt => ordered(left, right, span, |ord| ord == std::cmp::Ordering::Greater),
        BinaryOp::Ge => ordered(left, right, span, |ord| ord != std::cmp::Ordering::Less),
        BinaryOp::In => contains(right, left, span).map(Value::Bool),
        BinaryOp::NotIn => contains(right, left, span).map(|found| Value::Bool(!found)),
        BinaryOp::Matches => matches(left, right),
        BinaryOp::StartsWith => Ok(Value::Bool(
            left.render_string().starts_with(&right.render_string()),
        )),
        BinaryOp::EndsWith => Ok(Value::Bool(
            left.render_string().ends_with(&right.render_string()),
        )),
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        BinaryOp::NullCoalesce => Ok(if matches!(left, Value::Null) {
            right.clone()
        } else {
            left.clone()
        }),
    }
}

/// Apply a unary operator to an evaluated operand
pub fn unary(op: UnaryOp, operand: &Value, span: Span) -> RenderResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => match operand.coerce_number() {
            Some(Number::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
            Some(Number::Float(n)) => Ok(Value::Float(-n)),
            None => Err(RenderError::type_mismatch(
                &format!("cannot negate {}", operand.type_name()),
                span,
            )),
        },
    }
}

/// `+` tries numeric coercion on both operands first, then falls back
/// to string concatenation only when the left operand is a string
fn add(left: &Value, right: &Value, span: Span) -> RenderResult<Value> {
    if let (Some(a), Some(b)) = (left.coerce_number(), right.coerce_number()) {
        return Ok(match (a, b) {
            (Number::Int(a), Number::Int(b)) => Value::Int(a.wrapping_add(b)),
            _ => Value::Float(a.as_f64() + b.as_f64()),
        });
    }
    if let Value::Str(prefix) = left {
        let mut out = prefix.to_string();
        right.render_into(&mut out);
        return Ok(Value::string(out));
    }
    Err(RenderError::type_mismatch(
        &format!(
            "cannot add {} and {}",
            left.type_name(),
            right.type_name()
        ),
        span,
    ))
}

fn arithmetic(
    left: &Value,
    right: &Value,
    span: Span,
    symbol: &str,
    int_op: impl Fn(i64, i64) -> RenderResult<Number>,
    float_op: impl Fn(f64, f64) -> f64,
) -> RenderResult<Value> {
    match (left.coerce_number(), right.coerce_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(number_value(int_op(a, b)?)),
        (Some(a), Some(b)) => Ok(Value::Float(float_op(a.as_f64(), b.as_f64()))),
        _ => Err(RenderError::type_mismatch(
            &format!(
                "'{}' requires numeric operands, found {} and {}",
                symbol,
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

fn divide(left: &Value, right: &Value, span: Span) -> RenderResult<Value> {
    match (left.coerce_number(), right.coerce_number()) {
        (Some(a), Some(b)) => {
            if b.as_f64() == 0.0 {
                return Err(RenderError::DivisionByZero { span });
            }
            // Exact integer division stays integral
            match (a, b) {
                (Number::Int(a), Number::Int(b)) if a % b == 0 => Ok(Value::Int(a / b)),
                _ => Ok(Value::Float(a.as_f64() / b.as_f64())),
            }
        }
        _ => Err(RenderError::type_mismatch(
            &format!(
                "'/' requires numeric operands, found {} and {}",
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

fn modulo(left: &Value, right: &Value, span: Span) -> RenderResult<Value> {
    match (left.coerce_number(), right.coerce_number()) {
        (Some(a), Some(b)) => {
            if b.as_f64() == 0.0 {
                return Err(RenderError::DivisionByZero { span });
            }
            match (a, b) {
                (Number::Int(a), Number::Int(b)) => Ok(Value::Int(a % b)),
                _ => Ok(Value::Float(a.as_f64() % b.as_f64())),
            }
        }
        _ => Err(RenderError::type_mismatch(
            &format!(
                "'%' requires numeric operands, found {} and {}",
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

fn power(left: &Value, right: &Value, span: Span) -> RenderResult<Value> {
    match (left.coerce_number(), right.coerce_number()) {
        (Some(Number::Int(base)), Some(Number::Int(exp))) if (0..=u32::MAX as i64).contains(&exp) => {
            match base.checked_pow(exp as u32) {
                Some(n) => Ok(Value::Int(n)),
                None => Ok(Value::Float((base as f64).powf(exp as f64))),
            }
        }
        (Some(a), Some(b)) => Ok(Value::Float(a.as_f64().powf(b.as_f64()))),
        _ => Err(RenderError::type_mismatch(
            &format!(
                "'^' requires numeric operands, found {} and {}",
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

fn number_value(n: Number) -> Value {
    match n {
        Number::Int(n) => Value::Int(n),
        Number::Float(n) => Value::Float(n),
    }
}

fn ordered(
    left: &Value,
    right: &Value,
    span: Span,
    check: impl Fn(std::cmp::Ordering) -> bool,
) -> RenderResult<Value> {
    match (left.coerce_number(), right.coerce_number()) {
        (Some(a), Some(b)) => {
            let ord = a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(std::cmp::Ordering::Equal);
            Ok(Value::Bool(check(ord)))
        }
        _ => Err(RenderError::type_mismatch(
            &format!(
                "comparison requires numeric operands, found {} and {}",
                left.type_name(),
                right.type_name()
            ),
            span,
        )),
    }
}

/// Containment for `in`: substring for strings, element membership for
/// arrays, key membership for maps. Large arrays build a temporary hash
/// set of rendered keys to amortize repeated membership checks.
fn contains(container: &Value, needle: &Value, span: Span) -> RenderResult<bool> {
    match container {
        Value::Str(haystack) => Ok(haystack.contains(&needle.render_string())),
        Value::Array(items) => {
            if items.len() > CONTAINMENT_HASH_THRESHOLD && hashable(needle) {
                let keys: HashSet<String> = items
                    .iter()
                    .filter(|item| hashable(item))
                    .map(|item| item.render_string())
                    .collect();
                if keys.len() == items.len() {
                    return Ok(keys.contains(&needle.render_string()));
                }
                // Mixed content falls back to the linear scan
            }
            Ok(items.iter().any(|item| item.loose_eq(needle)))
        }
        Value::Map(entries) => Ok(entries.contains_key(&needle.render_string())),
        _ => Err(RenderError::type_mismatch(
            &format!("'in' requires a string, array, or map, found {}", container.type_name()),
            span,
        )),
    }
}

fn hashable(value: &Value) -> bool {
    matches!(value, Value::Str(_) | Value::Int(_) | Value::Bool(_))
}

/// `matches`: compile the right operand as a regular expression and
/// test the left operand. `/pattern/i` requests case-insensitive
/// matching; a bare pattern is used as-is.
fn matches(left: &Value, right: &Value) -> RenderResult<Value> {
    let raw = right.render_string();
    let (pattern, case_insensitive) = strip_regex_delimiters(&raw);

    let regex = regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| RenderError::InvalidRegex {
            pattern: raw.clone(),
            message: e.to_string(),
        })?;

    Ok(Value::Bool(regex.is_match(&left.render_string())))
}

fn strip_regex_delimiters(raw: &str) -> (&str, bool) {
    if let Some(stripped) = raw.strip_prefix('/') {
        if let Some(pattern) = stripped.strip_suffix("/i") {
            return (pattern, true);
        }
        if let Some(pattern) = stripped.strip_suffix('/') {
            return (pattern, false);
        }
    }
    (raw, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment::new()
    }

    fn bin(op: BinaryOp, left: Value, right: Value) -> RenderResult<Value> {
        binary(&env(), op, &left, &right, Span::dummy())
    }

    #[test]
    fn test_numeric_addition_with_string_coercion() {
        assert_eq!(
            bin(BinaryOp::Add, Value::string("5"), Value::Int(3)).unwrap(),
            Value::Int(8)
        );
        assert_eq!(
            bin(BinaryOp::Add, Value::Int(1), Value::Int(2)).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_string_concatenation_fallback() {
        assert_eq!(
            bin(BinaryOp::Add, Value::string("a"), Value::string("b")).unwrap(),
            Value::string("ab")
        );
        // Left operand not a string and not numeric: error
        let error = bin(BinaryOp::Add, Value::Null, Value::string("b")).unwrap_err();
        assert!(matches!(error, RenderError::TypeMismatch { .. }));
    }

    #[test]
    fn test_division() {
        assert_eq!(
            bin(BinaryOp::Div, Value::Int(10), Value::Int(2)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            bin(BinaryOp::Div, Value::Int(7), Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        let error = bin(BinaryOp::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert!(matches!(error, RenderError::DivisionByZero { .. }));
    }

    #[test]
    fn test_modulo_by_zero() {
        assert_eq!(
            bin(BinaryOp::Mod, Value::Int(7), Value::Int(3)).unwrap(),
            Value::Int(1)
        );
        let error = bin(BinaryOp::Mod, Value::Int(7), Value::Int(0)).unwrap_err();
        assert!(matches!(error, RenderError::DivisionByZero { .. }));
    }

    #[test]
    fn test_power() {
        assert_eq!(
            bin(BinaryOp::Pow, Value::Int(2), Value::Int(10)).unwrap(),
            Value::Int(1024)
        );
        assert_eq!(
            bin(BinaryOp::Pow, Value::Int(4), Value::Float(0.5)).unwrap(),
            Value::Float(2.0)
        );
    }

    #[test]
    fn test_comparisons_require_numbers() {
        assert_eq!(
            bin(BinaryOp::Lt, Value::Int(1), Value::string("2")).unwrap(),
            Value::Bool(true)
        );
        let error = bin(BinaryOp::Lt, Value::string("a"), Value::Int(1)).unwrap_err();
        assert!(matches!(error, RenderError::TypeMismatch { .. }));
    }

    #[test]
    fn test_concat_is_unconditional() {
        assert_eq!(
            bin(BinaryOp::Concat, Value::Int(1), Value::string("x")).unwrap(),
            Value::string("1x")
        );
    }

    #[test]
    fn test_containment() {
        let array = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            bin(BinaryOp::In, Value::Int(2), array.clone()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            bin(BinaryOp::NotIn, Value::Int(9), array).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            bin(BinaryOp::In, Value::string("ell"), Value::string("hello")).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_containment_hash_path_for_large_arrays() {
        let items: Vec<Value> = (0..100).map(Value::Int).collect();
        let array = Value::array(items);
        assert_eq!(
            bin(BinaryOp::In, Value::Int(73), array.clone()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            bin(BinaryOp::In, Value::Int(500), array).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_map_key_containment() {
        let mut entries = std::collections::BTreeMap::new();
        entries.insert("name".to_string(), Value::string("x"));
        let map = Value::map(entries);
        assert_eq!(
            bin(BinaryOp::In, Value::string("name"), map).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_matches_with_flags() {
        assert_eq!(
            bin(
                BinaryOp::Matches,
                Value::string("Hello"),
                Value::string("/hello/i")
            )
            .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            bin(
                BinaryOp::Matches,
                Value::string("abc123"),
                Value::string(r"\d+")
            )
            .unwrap(),
            Value::Bool(true)
        );
        let error = bin(
            BinaryOp::Matches,
            Value::string("x"),
            Value::string("/(unclosed/"),
        )
        .unwrap_err();
        assert!(matches!(error, RenderError::InvalidRegex { .. }));
    }

    #[test]
    fn test_prefix_suffix_checks() {
        assert_eq!(
            bin(
                BinaryOp::StartsWith,
                Value::string("template"),
                Value::string("temp")
            )
            .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            bin(
                BinaryOp::EndsWith,
                Value::string("template"),
                Value::string("late")
            )
            .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_custom_operator_takes_precedence() {
        let mut custom_env = Environment::new();
        custom_env.add_operator("+", |_, _| Ok(Value::string("custom")));
        let result = binary(
            &custom_env,
            BinaryOp::Add,
            &Value::Int(1),
            &Value::Int(2),
            Span::dummy(),
        )
        .unwrap();
        assert_eq!(result, Value::string("custom"));
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(
            unary(UnaryOp::Neg, &Value::Int(5), Span::dummy()).unwrap(),
            Value::Int(-5)
        );
        assert_eq!(
            unary(UnaryOp::Not, &Value::Bool(false), Span::dummy()).unwrap(),
            Value::Bool(true)
        );
        let error = unary(UnaryOp::Neg, &Value::string("abc"), Span::dummy()).unwrap_err();
        assert!(matches!(error, RenderError::TypeMismatch { .. }));
    }
}
