//! The dynamic JSON document model and the small set of coercion rules the
//! expression evaluator needs (truthiness, ordering, arithmetic).

use serde_json::Value;
use std::cmp::Ordering;

/// A document flowing through streams and operators. Aliases
/// `serde_json::Value` directly — see `Cargo.toml`'s `preserve_order`
/// feature for the ordered-mapping guarantee spec's data model requires.
pub type Document = Value;

/// Standard truthiness used by `where` and by `||`/`&&` short-circuiting:
/// non-zero number, non-empty string, any array/object, `true`. `null` and
/// `false` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numbers compare numerically, strings lexicographically; any other pairing
/// (including cross-type) is incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// `+`: numeric addition, string concatenation, otherwise `null` — except
/// that `null` coerces to `0` against a numeric partner, the permissive
/// coercion this query language uses throughout (and the behavior a running
/// accumulator like `n = n + 1` needs the first time `n` hasn't been set).
pub fn add(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Value::String(format!("{x}{y}")),
        _ => numeric_binop(a, b, |x, y| x + y),
    }
}

/// `-`, `*`, `/`: numeric only, otherwise `null`. Division by zero is `null`
/// rather than `inf`/panic — the engine never raises on a malformed
/// expression body, it drops to `null` the way `safeGet` does for a missing
/// path.
pub fn subtract(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |x, y| x - y)
}

pub fn multiply(a: &Value, b: &Value) -> Value {
    numeric_binop(a, b, |x, y| x * y)
}

pub fn divide(a: &Value, b: &Value) -> Value {
    match as_f64(b) {
        Some(y) if y != 0.0 => numeric_binop(a, b, |x, _| x / y),
        _ => Value::Null,
    }
}

fn numeric_binop(a: &Value, b: &Value, f: impl FnOnce(f64, f64) -> f64) -> Value {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => number(f(x, y)),
        _ => Value::Null,
    }
}

/// Numeric coercion for arithmetic: numbers pass through, `null` and `bool`
/// coerce the way they do in permissive dynamic languages (`null` -> `0`,
/// `false`/`true` -> `0`/`1`); strings and other composites never coerce.
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn number(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn negate(value: &Value) -> Value {
    match as_f64(value) {
        Some(f) => number(-f),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(add(&json!(1), &json!(2)), json!(3.0));
        assert_eq!(add(&json!("a"), &json!("b")), json!("ab"));
        let product = multiply(&json!(3), &json!(5.99)).as_f64().unwrap();
        assert!((product - 17.97).abs() < 1e-9);
        assert_eq!(divide(&json!(10), &json!(0)), Value::Null);
    }

    #[test]
    fn test_null_coerces_to_zero_in_arithmetic() {
        assert_eq!(add(&Value::Null, &json!(1)), json!(1.0));
        assert_eq!(add(&json!(1), &Value::Null), json!(1.0));
        assert_eq!(add(&Value::Null, &json!("x")), Value::Null);
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(1), &json!(2)), Some(Ordering::Less));
        assert_eq!(compare(&json!("a"), &json!("b")), Some(Ordering::Less));
        assert_eq!(compare(&json!(1), &json!("a")), None);
    }
}
