//! Safe, null-propagating property and index access over JSON documents.
//!
//! Mirrors the "missing path never panics, it just yields `null`" contract
//! used throughout the query language's evaluator.

use serde_json::Value;

/// Resolve a dotted path (`"a.b.c"`) against `root`, returning `Value::Null`
/// the moment any segment is missing or the current value isn't an object.
pub fn safe_get(root: &Value, path: &str) -> Value {
    let mut current = root;
    for segment in path.split('.') {
        match current.as_object().and_then(|map| map.get(segment)) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// `base[index]` semantics: object field lookup by string key, array element
/// lookup by integer key. Any other combination (non-integer array index,
/// out-of-range index, indexing a scalar) yields `Value::Null` rather than
/// erroring — indexing is total over the dynamic document model.
pub fn index_value(base: &Value, index: &Value) -> Value {
    match (base, index) {
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        (Value::Array(items), Value::Number(n)) => {
            let Some(i) = n.as_i64() else {
                return Value::Null;
            };
            if i < 0 {
                return Value::Null;
            }
            items.get(i as usize).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}
