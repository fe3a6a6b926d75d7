//! The scalar/aggregation function registry the transpiler consults to
//! decide what a bare `Call { name, args }` node means: names registered as
//! aggregations become `AggregationExpression` nodes, names registered as
//! scalars become scalar-function nodes.

use crate::document::is_truthy;
use serde_json::Value;

pub const AGGREGATION_NAMES: &[&str] = &["sum", "count"];
pub const SCALAR_NAMES: &[&str] = &["iff", "abs", "round"];

pub fn is_aggregation_name(name: &str) -> bool {
    AGGREGATION_NAMES.contains(&name)
}

pub fn is_scalar_name(name: &str) -> bool {
    SCALAR_NAMES.contains(&name)
}

/// Evaluate a registered scalar function over already-evaluated arguments.
pub fn call_scalar(name: &str, args: &[Value]) -> Value {
    match name {
        "iff" => match args {
            [cond, then_val, else_val] => {
                if is_truthy(cond) {
                    then_val.clone()
                } else {
                    else_val.clone()
                }
            }
            _ => Value::Null,
        },
        "abs" => args
            .first()
            .and_then(|v| v.as_f64())
            .and_then(|f| serde_json::Number::from_f64(f.abs()))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "round" => args
            .first()
            .and_then(|v| v.as_f64())
            .and_then(|f| serde_json::Number::from_f64(f.round()))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_iff() {
        assert_eq!(call_scalar("iff", &[json!(true), json!(1), json!(2)]), json!(1));
        assert_eq!(call_scalar("iff", &[json!(false), json!(1), json!(2)]), json!(2));
    }

    #[test]
    fn test_abs_round() {
        assert_eq!(call_scalar("abs", &[json!(-3.5)]), json!(3.5));
        assert_eq!(call_scalar("round", &[json!(3.6)]), json!(4.0));
    }
}
