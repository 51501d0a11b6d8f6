//! Runtime value model
//!
//! Values are cheap to clone: containers and strings sit behind `Arc`,
//! so passing values between scopes never deep-copies. Equality on
//! objects and pending macro calls is pointer identity.

use crate::runtime::attr_cache::Attributes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A macro invocation captured as a value: macro name plus evaluated
/// arguments, rendered only when written to output
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    pub macro_name: String,
    pub args: Vec<Value>,
}

/// Numeric view of a value after coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Float(n) => *n,
        }
    }
}

/// All values a template expression can produce
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Array(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),
    Object(Arc<dyn Attributes>),
    MacroCall(Arc<PendingCall>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Arc::from(s.into().as_str()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(entries))
    }

    pub fn object(obj: impl Attributes + 'static) -> Self {
        Value::Object(Arc::new(obj))
    }

    /// Runtime type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Object(obj) => obj.type_name(),
            Value::MacroCall(_) => "macro call",
        }
    }

    /// Truthiness: null is false, zero numbers are false, empty
    /// strings/containers are false, everything else is true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Object(_) => true,
            Value::MacroCall(_) => true,
        }
    }

    /// Element or character count for countable values
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            _ => self.len() == Some(0),
        }
    }

    /// Coerce to a number: ints and floats directly, strings by parsing.
    /// Bools, null, and containers do not coerce.
    pub fn coerce_number(&self) -> Option<Number> {
        match self {
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            Value::Str(s) => {
                let trimmed = s.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    Some(Number::Int(n))
                } else {
                    trimmed.parse::<f64>().ok().map(Number::Float)
                }
            }
            _ => None,
        }
    }

    /// Render to an output string. Null renders empty; containers render
    /// comma-joined elements; objects render their type name.
    pub fn render_string(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    pub fn render_into(&self, out: &mut String) {
        match self {
            Value::Null => {}
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(n) => {
                out.push_str(itoa_buffer(*n).as_str());
            }
            Value::Float(n) => {
                out.push_str(&format_float(*n));
            }
            Value::Str(s) => out.push_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.render_into(out);
                }
            }
            Value::Map(entries) => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(key);
                    out.push(':');
                    value.render_into(out);
                }
            }
            Value::Object(obj) => {
                out.push('<');
                out.push_str(obj.type_name());
                out.push('>');
            }
            // Pending calls are rendered by the evaluator; as a bare
            // string they have no representation
            Value::MacroCall(_) => {}
        }
    }

    /// Generalized equality: numeric comparison when both sides coerce
    /// to numbers, string comparison otherwise; objects and pending
    /// calls compare by identity
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::MacroCall(a), Value::MacroCall(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            _ => match (self.coerce_number(), other.coerce_number()) {
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => self.render_string() == other.render_string(),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.loose_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s.as_str()))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::map(entries)
    }
}

/// Format an integer without going through the formatting machinery
fn itoa_buffer(n: i64) -> String {
    let mut buf = [0u8; 20];
    let mut value = n.unsigned_abs();
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    let digits = std::str::from_utf8(&buf[pos..]).unwrap_or("0");
    if n < 0 {
        format!("-{}", digits)
    } else {
        digits.to_string()
    }
}

/// Format a float, keeping whole-number floats distinguishable
pub fn format_float(n: f64) -> String {
    if n == n.trunc() && n.is_finite() && n.abs() < 1e15 {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::array(vec![]).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::Bool(true).is_truthy());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Int(5).coerce_number(), Some(Number::Int(5)));
        assert_eq!(Value::string("5").coerce_number(), Some(Number::Int(5)));
        assert_eq!(
            Value::string(" 2.5 ").coerce_number(),
            Some(Number::Float(2.5))
        );
        assert_eq!(Value::string("abc").coerce_number(), None);
        assert_eq!(Value::Bool(true).coerce_number(), None);
        assert_eq!(Value::Null.coerce_number(), None);
    }

    #[test]
    fn test_render_string() {
        assert_eq!(Value::Null.render_string(), "");
        assert_eq!(Value::Int(-42).render_string(), "-42");
        assert_eq!(Value::Float(1.5).render_string(), "1.5");
        assert_eq!(Value::Float(2.0).render_string(), "2.0");
        assert_eq!(Value::string("hi").render_string(), "hi");
        assert_eq!(
            Value::array(vec![Value::Int(1), Value::Int(2)]).render_string(),
            "1,2"
        );
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Int(5).loose_eq(&Value::string("5")));
        assert!(Value::Int(5).loose_eq(&Value::Float(5.0)));
        assert!(!Value::Null.loose_eq(&Value::Int(0)));
        assert!(Value::string("a").loose_eq(&Value::string("a")));
        assert!(!Value::string("a").loose_eq(&Value::string("b")));
    }

    #[test]
    fn test_len_and_empty() {
        assert_eq!(Value::string("abc").len(), Some(3));
        assert_eq!(Value::array(vec![Value::Null]).len(), Some(1));
        assert_eq!(Value::Int(5).len(), None);
        assert!(Value::Null.is_empty());
        assert!(Value::string("").is_empty());
        assert!(!Value::string("x").is_empty());
    }
}
