//! Compiled expression tree: no closures over dynamic values, so operators
//! evaluate a tree of already-bound nodes instead.
//!
//! The transpiler lowers `streamql_core::ast::Expression` into this tree
//! once, at plan-build time; operators then evaluate it by recursive
//! descent against a bound `item` (and, inside `scan`, a `state` map) on
//! every push — a compiled expression tree in place of first-class
//! closures over dynamic values.

use crate::document::{self, Document};
use crate::functions;
use std::collections::HashMap;
use streamql_core::ast::BinaryOperator;
use streamql_core::index_value;

/// Per-step match state threaded through a `scan` operator's statements.
pub type ScanState = HashMap<String, Document>;

/// Reserved `state` key the `scan` operator stashes the current match's
/// integer id under while a step's statements run, so `MatchIdRef` can read
/// it without widening `Expr::eval`'s signature.
pub const MATCH_ID_KEY: &str = "__matchId";

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Document),
    /// The bound document itself (`item` as a bare identifier).
    ItemRoot,
    /// The whole per-step state map for a named scan step (`state.step`,
    /// narrowed further by a wrapping `Field`).
    StateRoot(String),
    /// Inside a scan step's own statements, a bare identifier that isn't a
    /// step name resolves here: the current step's own accumulated field if
    /// already set, else the incoming document's field of the same name.
    /// This is what lets `n = n + 1` mean "my own running `n`".
    SelfField(String, String),
    /// `matchId` — the integer identifying the current scan match, stashed
    /// under a reserved key in `state` while a step's statements run.
    MatchIdRef,
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    UnaryMinus(Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Object(Vec<ObjectFieldExpr>),
    Array(Vec<Expr>),
    Spread(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum ObjectFieldExpr {
    Pair(String, Expr),
    Spread(Expr),
    Exclude(String),
}

impl Expr {
    /// Convenience builder for `self.field` chains — handy for
    /// hand-assembled compiled trees in tests.
    pub fn field(self, name: &str) -> Expr {
        Expr::Field(Box::new(self), name.to_string())
    }

    pub fn eval(&self, item: &Document, state: &ScanState) -> Document {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::ItemRoot => item.clone(),
            Expr::StateRoot(step) => state.get(step).cloned().unwrap_or(Document::Null),
            Expr::SelfField(step, name) => {
                let existing = state
                    .get(step)
                    .and_then(|v| v.as_object())
                    .and_then(|m| m.get(name));
                match existing {
                    Some(v) => v.clone(),
                    None => index_value(item, &Document::String(name.clone())),
                }
            }
            Expr::MatchIdRef => state.get(MATCH_ID_KEY).cloned().unwrap_or(Document::Null),
            Expr::Field(base, name) => {
                index_value(&base.eval(item, state), &Document::String(name.clone()))
            }
            Expr::Index(base, index) => {
                index_value(&base.eval(item, state), &index.eval(item, state))
            }
            Expr::UnaryMinus(inner) => document::negate(&inner.eval(item, state)),
            Expr::BinaryOp { left, op, right } => eval_binary(left, *op, right, item, state),
            Expr::Call { name, args } => {
                let values: Vec<Document> = args.iter().map(|a| a.eval(item, state)).collect();
                functions::call_scalar(name, &values)
            }
            Expr::Array(items) => {
                Document::Array(items.iter().map(|e| e.eval(item, state)).collect())
            }
            Expr::Object(fields) => eval_object(fields, item, state),
            // A bare spread outside of an object/array context evaluates to
            // its operand; only `select`'s object builder treats it
            // specially (expanding its keys).
            Expr::Spread(inner) => inner.eval(item, state),
        }
    }
}

fn eval_binary(
    left: &Expr,
    op: BinaryOperator,
    right: &Expr,
    item: &Document,
    state: &ScanState,
) -> Document {
    use BinaryOperator::*;

    // `||`/`&&` short-circuit and never evaluate both sides eagerly.
    match op {
        Or => {
            let l = left.eval(item, state);
            if document::is_truthy(&l) {
                return l;
            }
            return right.eval(item, state);
        }
        And => {
            let l = left.eval(item, state);
            if !document::is_truthy(&l) {
                return l;
            }
            return right.eval(item, state);
        }
        _ => {}
    }

    let l = left.eval(item, state);
    let r = right.eval(item, state);
    match op {
        Equal => Document::Bool(l == r),
        NotEqual => Document::Bool(l != r),
        LessThan => Document::Bool(document::compare(&l, &r) == Some(std::cmp::Ordering::Less)),
        LessThanOrEqual => Document::Bool(matches!(
            document::compare(&l, &r),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        )),
        GreaterThan => {
            Document::Bool(document::compare(&l, &r) == Some(std::cmp::Ordering::Greater))
        }
        GreaterThanOrEqual => Document::Bool(matches!(
            document::compare(&l, &r),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        )),
        Add => document::add(&l, &r),
        Subtract => document::subtract(&l, &r),
        Multiply => document::multiply(&l, &r),
        Divide => document::divide(&l, &r),
        Or | And => unreachable!("handled above"),
    }
}

/// Builds a `select`/aggregation-template object in source order: static
/// pairs write under their key (last write wins), `...spread` copies the
/// evaluated expression's own keys in iteration order, and `-exclude`
/// removes a previously-written key.
fn eval_object(fields: &[ObjectFieldExpr], item: &Document, state: &ScanState) -> Document {
    let mut map = serde_json::Map::new();
    for field in fields {
        match field {
            ObjectFieldExpr::Pair(key, expr) => {
                map.insert(key.clone(), expr.eval(item, state));
            }
            ObjectFieldExpr::Spread(expr) => {
                if let Document::Object(spread_map) = expr.eval(item, state) {
                    for (k, v) in spread_map {
                        map.insert(k, v);
                    }
                }
            }
            ObjectFieldExpr::Exclude(key) => {
                map.remove(key);
            }
        }
    }
    Document::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_state() -> ScanState {
        HashMap::new()
    }

    #[test]
    fn test_field_access_on_item() {
        let expr = Expr::Field(Box::new(Expr::ItemRoot), "age".to_string());
        let item = json!({"age": 30});
        assert_eq!(expr.eval(&item, &empty_state()), json!(30));
    }

    #[test]
    fn test_missing_field_is_null() {
        let expr = Expr::Field(Box::new(Expr::ItemRoot), "missing".to_string());
        let item = json!({"age": 30});
        assert_eq!(expr.eval(&item, &empty_state()), json!(null));
    }

    #[test]
    fn test_item_root_is_identity() {
        let item = json!({"a": 1, "b": 2});
        assert_eq!(Expr::ItemRoot.eval(&item, &empty_state()), item);
    }

    #[test]
    fn test_or_and_short_circuit() {
        let item = json!({});
        let null_and_true = Expr::BinaryOp {
            left: Box::new(Expr::Literal(json!(null))),
            op: BinaryOperator::And,
            right: Box::new(Expr::Literal(json!(true))),
        };
        assert_eq!(null_and_true.eval(&item, &empty_state()), json!(null));

        let or_returns_left = Expr::BinaryOp {
            left: Box::new(Expr::Literal(json!("x"))),
            op: BinaryOperator::Or,
            right: Box::new(Expr::Literal(json!(false))),
        };
        assert_eq!(or_returns_left.eval(&item, &empty_state()), json!("x"));
    }

    #[test]
    fn test_select_object_spread_and_exclude() {
        let item = json!({"name": "John", "age": 30, "password": "s"});
        let fields = vec![
            ObjectFieldExpr::Spread(Expr::ItemRoot),
            ObjectFieldExpr::Exclude("password".to_string()),
        ];
        let result = eval_object(&fields, &item, &empty_state());
        assert_eq!(result, json!({"name": "John", "age": 30}));
    }

    #[test]
    fn test_index_out_of_range_is_null() {
        let expr = Expr::Index(Box::new(Expr::ItemRoot), Box::new(Expr::Literal(json!(99))));
        let item = json!([1, 2, 3]);
        assert_eq!(expr.eval(&item, &empty_state()), json!(null));
    }
}
