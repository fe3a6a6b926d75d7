//! Aggregation expression tree and aggregation-object template.
//!
//! A node is one of three kinds, inferred from its function name at
//! transpile time: `safeGet` (leaf), `scalar` (pure function over children's
//! current results), or `aggregation` (owns a stateful instance). Nesting is
//! permitted in both directions — `sum(exp(x))`, `exp(sum(x))`.

mod instance;

pub use instance::{new_instance, AggregationInstance};

use crate::document::Document;
use crate::functions;
use crate::plan::expr::{Expr, ScanState};
use std::collections::HashMap;

/// One node of an aggregation-expression tree.
#[derive(Debug)]
pub enum AggregationExpression {
    SafeGet {
        expr: Expr,
        cell: Document,
        dirty: bool,
    },
    Scalar {
        name: String,
        children: Vec<AggregationExpression>,
        cell: Document,
        dirty: bool,
    },
    Aggregation {
        kind: String,
        children: Vec<Expr>,
        instance: Box<dyn AggregationInstance>,
    },
}

impl AggregationExpression {
    pub fn safe_get(expr: Expr) -> Self {
        AggregationExpression::SafeGet {
            expr,
            cell: Document::Null,
            dirty: false,
        }
    }

    pub fn scalar(name: String, children: Vec<AggregationExpression>) -> Self {
        AggregationExpression::Scalar {
            name,
            children,
            cell: Document::Null,
            dirty: false,
        }
    }

    pub fn aggregation(kind: String, children: Vec<Expr>) -> Option<Self> {
        let instance = new_instance(&kind)?;
        Some(AggregationExpression::Aggregation {
            kind,
            children,
            instance,
        })
    }

    pub fn push(&mut self, item: &Document) {
        // Aggregation expressions only ever evaluate in `item`'s context —
        // only safeGet and scalar children are legal here — so there is
        // never a scan `state` map to bind.
        let state: ScanState = HashMap::new();

        match self {
            AggregationExpression::SafeGet { expr, cell, dirty } => {
                *cell = expr.eval(item, &state);
                *dirty = true;
            }
            AggregationExpression::Scalar {
                name,
                children,
                cell,
                dirty,
            } => {
                for child in children.iter_mut() {
                    child.push(item);
                }
                let args: Vec<Document> = children.iter().map(|c| c.result()).collect();
                *cell = functions::call_scalar(name, &args);
                *dirty = true;
            }
            AggregationExpression::Aggregation {
                children, instance, ..
            } => {
                for child_expr in children {
                    instance.push(&child_expr.eval(item, &state));
                }
            }
        }
    }

    pub fn result(&self) -> Document {
        match self {
            AggregationExpression::SafeGet { cell, .. } => cell.clone(),
            AggregationExpression::Scalar { cell, .. } => cell.clone(),
            AggregationExpression::Aggregation { instance, .. } => instance.result(),
        }
    }

    pub fn changed(&self) -> bool {
        match self {
            AggregationExpression::SafeGet { dirty, .. } => *dirty,
            AggregationExpression::Scalar { dirty, children, .. } => {
                *dirty || children.iter().any(|c| c.changed())
            }
            AggregationExpression::Aggregation { instance, .. } => instance.changed(),
        }
    }

    pub fn mark_change_checked(&mut self) {
        match self {
            AggregationExpression::SafeGet { dirty, .. } => *dirty = false,
            AggregationExpression::Scalar { dirty, children, .. } => {
                *dirty = false;
                for c in children.iter_mut() {
                    c.mark_change_checked();
                }
            }
            AggregationExpression::Aggregation { instance, .. } => instance.mark_change_checked(),
        }
    }

    /// Recursive clone that shares nothing: aggregation leaves get a fresh,
    /// zeroed instance rather than a copy of accumulated state.
    pub fn fresh_clone(&self) -> Self {
        match self {
            AggregationExpression::SafeGet { expr, .. } => Self::safe_get(expr.clone()),
            AggregationExpression::Scalar { name, children, .. } => Self::scalar(
                name.clone(),
                children.iter().map(|c| c.fresh_clone()).collect(),
            ),
            AggregationExpression::Aggregation {
                kind,
                children,
                instance,
            } => AggregationExpression::Aggregation {
                kind: kind.clone(),
                children: children.clone(),
                instance: instance.fresh(),
            },
        }
    }
}

/// Template structure mirroring the shape of the `summarize { ... }` object
/// literal: static literals and nested objects/arrays are copied verbatim,
/// while leaf aggregation-expression trees hold the live per-group state.
#[derive(Debug)]
pub enum AggregationTemplate {
    Literal(Document),
    /// Bare reference to the window's name inside the template — resolves
    /// to the current window descriptor at result time.
    WindowRef,
    Leaf(AggregationExpression),
    Object(Vec<(String, AggregationTemplate)>),
    Array(Vec<AggregationTemplate>),
}

impl AggregationTemplate {
    pub fn push(&mut self, item: &Document) {
        match self {
            AggregationTemplate::Literal(_) | AggregationTemplate::WindowRef => {}
            AggregationTemplate::Leaf(expr) => expr.push(item),
            AggregationTemplate::Object(fields) => {
                for (_, child) in fields.iter_mut() {
                    child.push(item);
                }
            }
            AggregationTemplate::Array(items) => {
                for child in items.iter_mut() {
                    child.push(item);
                }
            }
        }
    }

    pub fn result(&self, window_value: &Document) -> Document {
        match self {
            AggregationTemplate::Literal(v) => v.clone(),
            AggregationTemplate::WindowRef => window_value.clone(),
            AggregationTemplate::Leaf(expr) => expr.result(),
            AggregationTemplate::Object(fields) => {
                let mut map = serde_json::Map::new();
                for (key, child) in fields {
                    map.insert(key.clone(), child.result(window_value));
                }
                Document::Object(map)
            }
            AggregationTemplate::Array(items) => {
                Document::Array(items.iter().map(|c| c.result(window_value)).collect())
            }
        }
    }

    pub fn changed(&self) -> bool {
        match self {
            AggregationTemplate::Literal(_) | AggregationTemplate::WindowRef => false,
            AggregationTemplate::Leaf(expr) => expr.changed(),
            AggregationTemplate::Object(fields) => fields.iter().any(|(_, c)| c.changed()),
            AggregationTemplate::Array(items) => items.iter().any(|c| c.changed()),
        }
    }

    pub fn mark_change_checked(&mut self) {
        match self {
            AggregationTemplate::Literal(_) | AggregationTemplate::WindowRef => {}
            AggregationTemplate::Leaf(expr) => expr.mark_change_checked(),
            AggregationTemplate::Object(fields) => {
                for (_, c) in fields.iter_mut() {
                    c.mark_change_checked();
                }
            }
            AggregationTemplate::Array(items) => {
                for c in items.iter_mut() {
                    c.mark_change_checked();
                }
            }
        }
    }

    pub fn fresh_clone(&self) -> Self {
        match self {
            AggregationTemplate::Literal(v) => AggregationTemplate::Literal(v.clone()),
            AggregationTemplate::WindowRef => AggregationTemplate::WindowRef,
            AggregationTemplate::Leaf(expr) => AggregationTemplate::Leaf(expr.fresh_clone()),
            AggregationTemplate::Object(fields) => AggregationTemplate::Object(
                fields.iter().map(|(k, c)| (k.clone(), c.fresh_clone())).collect(),
            ),
            AggregationTemplate::Array(items) => {
                AggregationTemplate::Array(items.iter().map(|c| c.fresh_clone()).collect())
            }
        }
    }
}

/// An `AggregationTemplate` installed for one group key: owns live state,
/// cloned fresh from the template on first document for that key. No group
/// shares mutable state with another.
#[derive(Debug)]
pub struct AggregationObject {
    root: AggregationTemplate,
}

impl AggregationObject {
    pub fn from_template(template: &AggregationTemplate) -> Self {
        Self {
            root: template.fresh_clone(),
        }
    }

    pub fn push(&mut self, item: &Document) {
        self.root.push(item);
    }

    pub fn get_result(&self, window_value: &Document) -> Document {
        self.root.result(window_value)
    }

    pub fn changed(&self) -> bool {
        self.root.changed()
    }

    pub fn mark_change_checked(&mut self) {
        self.root.mark_change_checked();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::expr::Expr;
    use serde_json::json;

    fn field(name: &str) -> Expr {
        Expr::Field(Box::new(Expr::ItemRoot), name.to_string())
    }

    #[test]
    fn test_sum_and_count_leaves() {
        let template = AggregationTemplate::Object(vec![
            (
                "total".to_string(),
                AggregationTemplate::Leaf(
                    AggregationExpression::aggregation("sum".to_string(), vec![field("amount")])
                        .unwrap(),
                ),
            ),
            (
                "count".to_string(),
                AggregationTemplate::Leaf(
                    AggregationExpression::aggregation("count".to_string(), vec![]).unwrap(),
                ),
            ),
        ]);

        let mut obj = AggregationObject::from_template(&template);
        obj.push(&json!({"amount": 1200}));
        obj.push(&json!({"amount": 1100}));

        assert_eq!(
            obj.get_result(&Document::Null),
            json!({"total": 2300.0, "count": 2})
        );
    }

    #[test]
    fn test_group_cloning_is_independent() {
        let template = AggregationTemplate::Leaf(
            AggregationExpression::aggregation("count".to_string(), vec![]).unwrap(),
        );
        let mut a = AggregationObject::from_template(&template);
        let b = AggregationObject::from_template(&template);
        a.push(&json!({}));
        assert_eq!(a.get_result(&Document::Null), json!(1));
        assert_eq!(b.get_result(&Document::Null), json!(0));
    }

    #[test]
    fn test_scalar_wraps_aggregation() {
        // iff(count() >= 0, count(), 0) — exercises scalar(aggregation) nesting.
        let count_leaf =
            AggregationExpression::aggregation("count".to_string(), vec![]).unwrap();
        let mut scalar = AggregationExpression::scalar(
            "round".to_string(),
            vec![count_leaf],
        );
        scalar.push(&json!({}));
        scalar.push(&json!({}));
        assert_eq!(scalar.result(), json!(2.0));
    }

    #[test]
    fn test_change_tracking() {
        let mut leaf = AggregationExpression::aggregation("count".to_string(), vec![]).unwrap();
        assert!(!leaf.changed());
        leaf.push(&json!({}));
        assert!(leaf.changed());
        leaf.mark_change_checked();
        assert!(!leaf.changed());
    }
}
