//! Cell values and best-effort numeric coercion

use std::borrow::Cow;

use serde::Serialize;

/// A single cell value
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Blank spreadsheet cell
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Token written for a blank cell
pub const EMPTY_TOKEN: &str = "None";

/// One row of a table, in column order
pub type Row = Vec<Value>;

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            // Cross-type numeric comparison
            (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
            _ => false,
        }
    }
}

impl Value {
    /// Check if the value is a blank cell
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Check if the value is text
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Convert to the string written into delimited output
    ///
    /// Every value, blanks included, produces a non-empty token so written
    /// lines keep one field per column. Finite floats always keep a decimal
    /// point so the line reads back as a float.
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            Value::Empty => Cow::Borrowed(EMPTY_TOKEN),
            Value::Bool(true) => Cow::Borrowed("True"),
            Value::Bool(false) => Cow::Borrowed("False"),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(f) => Cow::Owned(format_float(*f)),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }
}

fn format_float(f: f64) -> String {
    if !f.is_finite() {
        return f.to_string();
    }
    if f.abs() >= 1e16 {
        // Exponent form; the mantissa needs a point too ("1e16" -> "1.0e16")
        let s = format!("{f:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) if !mantissa.contains('.') => format!("{mantissa}.0e{exp}"),
            _ => s,
        };
    }
    if f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Empty,
        }
    }
}

/// Coerce a source value into its most specific numeric form.
///
/// Non-text values pass through unchanged. Text containing a `.` is tried
/// as a float, any other text as an integer; text that does not parse is
/// returned as-is. Never fails.
pub fn coerce(value: Value) -> Value {
    match value {
        Value::Text(s) => coerce_str(&s).unwrap_or(Value::Text(s)),
        other => other,
    }
}

/// Coerce a borrowed token, allocating only when it stays text
pub fn coerce_token(token: &str) -> Value {
    coerce_str(token).unwrap_or_else(|| Value::Text(token.to_string()))
}

fn coerce_str(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.contains('.') {
        trimmed.parse::<f64>().ok().map(Value::Float)
    } else {
        trimmed.parse::<i64>().ok().map(Value::Int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_rules() {
        assert!(matches!(coerce("42".into()), Value::Int(42)));
        assert!(matches!(coerce("4.2".into()), Value::Float(f) if f == 4.2));
        assert!(matches!(coerce("-7".into()), Value::Int(-7)));
        assert!(matches!(coerce(".5".into()), Value::Float(f) if f == 0.5));
        assert_eq!(coerce("4.2.0".into()), Value::Text("4.2.0".to_string()));
        assert_eq!(coerce("abc".into()), Value::Text("abc".to_string()));
        assert!(matches!(coerce(Value::Int(7)), Value::Int(7)));
        assert!(matches!(coerce(Value::Bool(true)), Value::Bool(true)));
        assert!(coerce(Value::Empty).is_empty());
    }

    #[test]
    fn test_coerce_without_dot_never_yields_float() {
        // "1e3" has no dot, so only an integer parse is attempted
        assert_eq!(coerce_token("1e3"), Value::Text("1e3".to_string()));
        assert_eq!(coerce_token("inf"), Value::Text("inf".to_string()));
        assert!(matches!(coerce_token("1.5e3"), Value::Float(f) if f == 1500.0));
    }

    #[test]
    fn test_coerce_integer_overflow_stays_text() {
        let big = "99999999999999999999";
        assert_eq!(coerce_token(big), Value::Text(big.to_string()));
    }

    #[test]
    fn test_coerce_keeps_original_text_on_failure() {
        assert_eq!(coerce_token(" x.y "), Value::Text(" x.y ".to_string()));
        assert!(matches!(coerce_token(" 12 "), Value::Int(12)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(100).to_string(), "100");
        assert_eq!(Value::Float(100.0).to_string(), "100.0");
        assert_eq!(Value::Float(4.25).to_string(), "4.25");
        assert_eq!(Value::Text("a b".into()).to_string(), "a b");
        assert_eq!(Value::Empty.to_string(), "None");
        assert_eq!(Value::Bool(false).to_string(), "False");
        assert_eq!(Value::Bool(true).to_string(), "True");
    }

    #[test]
    fn test_large_floats_keep_a_point() {
        assert_eq!(Value::Float(1e16).to_string(), "1.0e16");
        assert_eq!(Value::Float(-2.5e20).to_string(), "-2.5e20");
        assert_eq!(Value::Float(123456789012345.0).to_string(), "123456789012345.0");

        for f in [1e16, -2.5e20, 1e300, 123456789012345.0] {
            let token = Value::Float(f).to_string();
            assert!(
                matches!(coerce_token(&token), Value::Float(g) if g == f),
                "{token} should read back as a float"
            );
        }
    }

    #[test]
    fn test_cross_type_numeric_equality() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Text("3".into()));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }
}
