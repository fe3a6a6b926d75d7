//! `scan` operator: a small multi-step pattern matcher over the stream.
//! Each step has a condition and a body of `field = expr` / `emit(expr)`
//! statements; a step "promotes" the previous step's match state into its
//! own slot when its condition holds against a document that already
//! satisfied the previous step, or "continues" its own already-open match.
//! Steps are checked last-to-first per document so a promotion this round
//! never gets double-counted as a continuation later in the same round.
//!
//! This operator supports one live match per step chain at a time — the
//! state map has one slot per step name, not one per concurrently-open
//! match. Fine for the common session-tracking idiom (one session per scan
//! instance); documented as a scope decision in DESIGN.md.

use super::{Downstream, Operator};
use crate::document::{self, Document};
use crate::plan::expr::{ScanState, MATCH_ID_KEY};
use crate::plan::{CompiledScanStatement, CompiledScanStep};
use serde_json::Map;

#[derive(Debug)]
pub struct ScanOperator {
    steps: Vec<CompiledScanStep>,
    live: Vec<bool>,
    state: ScanState,
    match_id: i64,
    downstream: Downstream,
}

impl ScanOperator {
    pub fn new(steps: Vec<CompiledScanStep>, downstream: Downstream) -> Self {
        let live = vec![false; steps.len()];
        Self {
            steps,
            live,
            state: ScanState::new(),
            match_id: 0,
            downstream,
        }
    }

    fn run_statements(&mut self, step_idx: usize, item: &Document) {
        self.state
            .insert(MATCH_ID_KEY.to_string(), Document::from(self.match_id));
        let step_name = self.steps[step_idx].name.clone();
        for stmt_idx in 0..self.steps[step_idx].statements.len() {
            // Re-borrow per iteration: `emit` may push downstream, which
            // needs `&mut self.downstream` while `self.steps`/`self.state`
            // stay untouched — but we can't hold a `self.steps` borrow
            // across that call, so statements are cloned out first.
            match &self.steps[step_idx].statements[stmt_idx] {
                CompiledScanStatement::Assign(field, expr) => {
                    let value = expr.eval(item, &self.state);
                    let entry = self
                        .state
                        .entry(step_name.clone())
                        .or_insert_with(|| Document::Object(Map::new()));
                    match entry {
                        Document::Object(map) => {
                            map.insert(field.clone(), value);
                        }
                        _ => {
                            let mut map = Map::new();
                            map.insert(field.clone(), value);
                            *entry = Document::Object(map);
                        }
                    }
                }
                CompiledScanStatement::Emit(expr) => {
                    let value = expr.eval(item, &self.state);
                    self.downstream.push(value);
                }
            }
        }
    }
}

impl Operator for ScanOperator {
    fn push(&mut self, item: Document) {
        let n = self.steps.len();
        let mut matched = vec![false; n];

        for i in (0..n).rev() {
            if !matched[i] && i > 0 && self.live[i - 1] {
                let holds = document::is_truthy(&self.steps[i].condition.eval(&item, &self.state));
                if holds {
                    let prev_name = self.steps[i - 1].name.clone();
                    let payload = self
                        .state
                        .remove(&prev_name)
                        .unwrap_or_else(|| Document::Object(Map::new()));
                    self.live[i - 1] = false;
                    self.state.insert(self.steps[i].name.clone(), payload);
                    self.run_statements(i, &item);
                    self.live[i] = true;
                    matched[i] = true;
                }
            }

            if !matched[i] && (i == 0 || self.live[i]) {
                let holds = document::is_truthy(&self.steps[i].condition.eval(&item, &self.state));
                if holds {
                    if i == 0 && !self.live[0] {
                        self.match_id += 1;
                        self.state
                            .insert(self.steps[0].name.clone(), Document::Object(Map::new()));
                    }
                    self.run_statements(i, &item);
                    self.live[i] = true;
                    matched[i] = true;
                }
            }
        }
    }

    fn flush(&mut self) {
        self.downstream.flush();
    }
}
