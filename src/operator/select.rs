//! `select` operator: rebuilds each document from the compiled object
//! template (static pairs, `...spread`, `-exclude`).

use super::{Downstream, Operator};
use crate::document::Document;
use crate::plan::expr::{Expr, ScanState};
use std::collections::HashMap;

#[derive(Debug)]
pub struct SelectOperator {
    template: Expr,
    downstream: Downstream,
}

impl SelectOperator {
    pub fn new(template: Expr, downstream: Downstream) -> Self {
        Self {
            template,
            downstream,
        }
    }
}

impl Operator for SelectOperator {
    fn push(&mut self, doc: Document) {
        let state: ScanState = HashMap::new();
        let projected = self.template.eval(&doc, &state);
        self.downstream.push(projected);
    }

    fn flush(&mut self) {
        self.downstream.flush();
    }
}
