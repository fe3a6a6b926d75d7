//! `where` operator: drops documents whose condition isn't truthy, forwards
//! the rest unchanged.

use super::{Downstream, Operator};
use crate::document::{self, Document};
use crate::plan::expr::{Expr, ScanState};
use std::collections::HashMap;

#[derive(Debug)]
pub struct FilterOperator {
    condition: Expr,
    downstream: Downstream,
}

impl FilterOperator {
    pub fn new(condition: Expr, downstream: Downstream) -> Self {
        Self {
            condition,
            downstream,
        }
    }
}

impl Operator for FilterOperator {
    fn push(&mut self, doc: Document) {
        let state: ScanState = HashMap::new();
        if document::is_truthy(&self.condition.eval(&doc, &state)) {
            self.downstream.push(doc);
        }
    }

    fn flush(&mut self) {
        self.downstream.flush();
    }
}
