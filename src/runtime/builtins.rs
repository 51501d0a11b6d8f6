//! Built-in functions, default filters, and default tests
//!
//! Functions here are the last stop in dispatch: macros in scope and
//! environment-registered functions are consulted first. `range` always
//! returns an ordered sequence (possibly empty), never null, because
//! loop constructs expect an iterable.

use crate::runtime::environment::Environment;
use crate::runtime::error::{RenderError, RenderResult};
use crate::runtime::value::{Number, Value};
use crate::utils::Span;

/// Dispatch a built-in function by name. Returns `None` for names that
/// are not built-ins so the caller can report an unknown function.
pub fn call_builtin(name: &str, args: &[Value], span: Span) -> Option<RenderResult<Value>> {
    match name {
        "range" => Some(range(args)),
        "length" | "count" => Some(length(args, span)),
        "max" => Some(extremum(args, true)),
        "min" => Some(extremum(args, false)),
        _ => None,
    }
}

pub fn is_builtin(name: &str) -> bool {
    matches!(name, "range" | "length" | "count" | "max" | "min")
}

/// `range(start, end[, step])` with an inclusive end. A step whose sign
/// cannot reach the end from the start yields an empty sequence; a zero
/// step is an error.
fn range(args: &[Value]) -> RenderResult<Value> {
    let (start, end, step) = match args {
        [start, end] => (int_arg(start, "start")?, int_arg(end, "end")?, None),
        [start, end, step] => (
            int_arg(start, "start")?,
            int_arg(end, "end")?,
            Some(int_arg(step, "step")?),
        ),
        _ => {
            return Err(RenderError::invalid_range(
                "range expects 2 or 3 arguments",
            ))
        }
    };

    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(RenderError::invalid_range("range step must not be zero"));
    }

    let mut items = Vec::new();
    let mut current = start;
    if step > 0 {
        while current <= end {
            items.push(Value::Int(current));
            current = match current.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    } else {
        while current >= end {
            items.push(Value::Int(current));
            current = match current.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }
    Ok(Value::array(items))
}

fn int_arg(value: &Value, name: &str) -> RenderResult<i64> {
    match value.coerce_number() {
        Some(Number::Int(n)) => Ok(n),
        Some(Number::Float(n)) => Ok(n as i64),
        None => Err(RenderError::invalid_range(&format!(
            "range {} must be a number, found {}",
            name,
            value.type_name()
        ))),
    }
}

/// Element count for containers, character count for strings
fn length(args: &[Value], span: Span) -> RenderResult<Value> {
    let value = args.first().unwrap_or(&Value::Null);
    match value {
        Value::Null => Ok(Value::Int(0)),
        other => match other.len() {
            Some(n) => Ok(Value::Int(n as i64)),
            None => Err(RenderError::type_mismatch(
                &format!("{} has no length", other.type_name()),
                span,
            )),
        },
    }
}

/// `max`/`min` over the arguments, or over a single array argument.
/// Numeric when every element coerces, string ordering otherwise.
fn extremum(args: &[Value], want_max: bool) -> RenderResult<Value> {
    let items: Vec<Value> = match args {
        [Value::Array(items)] => items.as_ref().clone(),
        other => other.to_vec(),
    };
    if items.is_empty() {
        return Ok(Value::Null);
    }

    let all_numeric = items.iter().all(|item| item.coerce_number().is_some());
    let mut best = items[0].clone();
    for candidate in &items[1..] {
        let beats = if all_numeric {
            let a = candidate.coerce_number().map(|n| n.as_f64()).unwrap_or(0.0);
            let b = best.coerce_number().map(|n| n.as_f64()).unwrap_or(0.0);
            if want_max { a > b } else { a < b }
        } else {
            let a = candidate.render_string();
            let b = best.render_string();
            if want_max { a > b } else { a < b }
        };
        if beats {
            best = candidate.clone();
        }
    }
    Ok(best)
}

/// Register the standard filter set
pub fn register_default_filters(env: &mut Environment) {
    env.add_filter("upper", |value, _| {
        Ok(Value::string(value.render_string().to_uppercase()))
    });
    env.add_filter("lower", |value, _| {
        Ok(Value::string(value.render_string().to_lowercase()))
    });
    env.add_filter("trim", |value, _| {
        Ok(Value::string(value.render_string().trim().to_string()))
    });
    env.add_filter("capitalize", |value, _| {
        let text = value.render_string();
        let mut chars = text.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
            None => String::new(),
        };
        Ok(Value::string(capitalized))
    });
    env.add_filter("join", |value, args| {
        let separator = args.first().map(|v| v.render_string()).unwrap_or_default();
        match value {
            Value::Array(items) => {
                let joined: Vec<String> = items.iter().map(|item| item.render_string()).collect();
                Ok(Value::string(joined.join(&separator)))
            }
            other => Ok(other.clone()),
        }
    });
    env.add_filter("first", |value, _| match value {
        Value::Array(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        Value::Str(s) => Ok(s
            .chars()
            .next()
            .map(|c| Value::string(c.to_string()))
            .unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    });
    env.add_filter("last", |value, _| match value {
        Value::Array(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        Value::Str(s) => Ok(s
            .chars()
            .last()
            .map(|c| Value::string(c.to_string()))
            .unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    });
    env.add_filter("default", |value, args| {
        let fallback = args.first().cloned().unwrap_or(Value::Null);
        let use_fallback = match value {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            _ => false,
        };
        Ok(if use_fallback {
            fallback
        } else {
            value.clone()
        })
    });
    env.add_filter("length", |value, _| {
        let count = value
            .len()
            .unwrap_or_else(|| value.render_string().chars().count());
        Ok(Value::Int(count as i64))
    });
    env.add_filter("reverse", |value, _| match value {
        Value::Array(items) => {
            let mut reversed = items.as_ref().clone();
            reversed.reverse();
            Ok(Value::array(reversed))
        }
        other => Ok(Value::string(
            other.render_string().chars().rev().collect::<String>(),
        )),
    });
    env.add_filter("abs", |value, _| match value.coerce_number() {
        Some(Number::Int(n)) => Ok(Value::Int(n.wrapping_abs())),
        Some(Number::Float(n)) => Ok(Value::Float(n.abs())),
        None => Ok(value.clone()),
    });
    env.add_filter("escape", |value, _| {
        let text = value.render_string();
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#39;"),
                other => escaped.push(other),
            }
        }
        Ok(Value::string(escaped))
    });
}

/// Register the standard test set
pub fn register_default_tests(env: &mut Environment) {
    env.add_test("defined", |value, _| Ok(!matches!(value, Value::Null)));
    env.add_test("undefined", |value, _| Ok(matches!(value, Value::Null)));
    env.add_test("empty", |value, _| Ok(value.is_empty()));
    env.add_test("odd", |value, _| {
        Ok(matches!(value.coerce_number(), Some(Number::Int(n)) if n % 2 != 0))
    });
    env.add_test("even", |value, _| {
        Ok(matches!(value.coerce_number(), Some(Number::Int(n)) if n % 2 == 0))
    });
    env.add_test("divisibleby", |value, args| {
        let divisor = match args.first().and_then(|v| v.coerce_number()) {
            Some(Number::Int(n)) if n != 0 => n,
            _ => return Ok(false),
        };
        Ok(matches!(value.coerce_number(), Some(Number::Int(n)) if n % divisor == 0))
    });
    env.add_test("iterable", |value, _| {
        Ok(matches!(value, Value::Array(_) | Value::Map(_)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> RenderResult<Value> {
        call_builtin(name, args, Span::dummy()).unwrap()
    }

    #[test]
    fn test_range_inclusive_ascending() {
        let result = call("range", &[Value::Int(1), Value::Int(4)]).unwrap();
        assert_eq!(
            result,
            Value::array(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(4)
            ])
        );
    }

    #[test]
    fn test_range_descending() {
        let result = call("range", &[Value::Int(5), Value::Int(1), Value::Int(-1)]).unwrap();
        assert_eq!(
            result,
            Value::array(vec![
                Value::Int(5),
                Value::Int(4),
                Value::Int(3),
                Value::Int(2),
                Value::Int(1)
            ])
        );
    }

    #[test]
    fn test_range_unreachable_direction_is_empty() {
        let result = call("range", &[Value::Int(5), Value::Int(1), Value::Int(1)]).unwrap();
        assert_eq!(result, Value::array(vec![]));
    }

    #[test]
    fn test_range_zero_step_is_error() {
        let error = call("range", &[Value::Int(1), Value::Int(5), Value::Int(0)]).unwrap_err();
        assert!(matches!(error, RenderError::InvalidRange { .. }));
    }

    #[test]
    fn test_length_and_count() {
        assert_eq!(
            call("length", &[Value::string("abc")]).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            call("count", &[Value::array(vec![Value::Int(1)])]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(call("length", &[Value::Null]).unwrap(), Value::Int(0));
        assert!(call("length", &[Value::Int(5)]).is_err());
    }

    #[test]
    fn test_max_min() {
        let args = [Value::Int(3), Value::Int(9), Value::Int(1)];
        assert_eq!(call("max", &args).unwrap(), Value::Int(9));
        assert_eq!(call("min", &args).unwrap(), Value::Int(1));

        // Single array argument spreads
        let array = [Value::array(vec![Value::Int(2), Value::Int(7)])];
        assert_eq!(call("max", &array).unwrap(), Value::Int(7));

        assert_eq!(call("max", &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_default_filters() {
        let env = Environment::with_defaults();

        let upper = env.filter("upper").unwrap();
        assert_eq!(
            upper(&Value::string("abc"), &[]).unwrap(),
            Value::string("ABC")
        );

        let capitalize = env.filter("capitalize").unwrap();
        assert_eq!(
            capitalize(&Value::string("hELLO"), &[]).unwrap(),
            Value::string("Hello")
        );

        let join = env.filter("join").unwrap();
        assert_eq!(
            join(
                &Value::array(vec![Value::Int(1), Value::Int(2)]),
                &[Value::string(", ")]
            )
            .unwrap(),
            Value::string("1, 2")
        );

        let default = env.filter("default").unwrap();
        assert_eq!(
            default(&Value::Null, &[Value::string("anon")]).unwrap(),
            Value::string("anon")
        );
        assert_eq!(
            default(&Value::Int(0), &[Value::string("anon")]).unwrap(),
            Value::Int(0)
        );

        let reverse = env.filter("reverse").unwrap();
        assert_eq!(
            reverse(&Value::string("abc"), &[]).unwrap(),
            Value::string("cba")
        );

        let escape = env.filter("escape").unwrap();
        assert_eq!(
            escape(&Value::string("<a & b>"), &[]).unwrap(),
            Value::string("&lt;a &amp; b&gt;")
        );
    }

    #[test]
    fn test_default_tests() {
        let env = Environment::with_defaults();

        let defined = env.test("defined").unwrap();
        assert!(!defined(&Value::Null, &[]).unwrap());
        assert!(defined(&Value::Int(0), &[]).unwrap());

        let empty = env.test("empty").unwrap();
        assert!(empty(&Value::string(""), &[]).unwrap());
        assert!(!empty(&Value::string("x"), &[]).unwrap());

        let odd = env.test("odd").unwrap();
        assert!(odd(&Value::Int(3), &[]).unwrap());
        assert!(!odd(&Value::Int(4), &[]).unwrap());
        assert!(!odd(&Value::string("abc"), &[]).unwrap());

        let divisibleby = env.test("divisibleby").unwrap();
        assert!(divisibleby(&Value::Int(9), &[Value::Int(3)]).unwrap());
        assert!(!divisibleby(&Value::Int(9), &[Value::Int(0)]).unwrap());

        let iterable = env.test("iterable").unwrap();
        assert!(iterable(&Value::array(vec![]), &[]).unwrap());
        assert!(!iterable(&Value::Int(1), &[]).unwrap());
    }
}
