//! `summarize` operator: the most stateful operator in the pipeline. A
//! single `over <window>` clause is shared by every group the operator ever
//! sees — the window's arrival counter (or value bucket) runs across the
//! whole input, not per group — so a window transition emits the
//! aggregated result for every live group at once. Each `(group key, window
//! id)` pair gets its own `AggregationObject`, fed an arriving document's
//! `by` values.
//!
//! Windowed summaries never share a window emission policy with `emit` —
//! the transpiler already rejects `over` + `emit` together — so this
//! operator only ever runs one of the two emission strategies below.

use super::{Downstream, Operator};
use crate::aggregation::AggregationObject;
use crate::document::Document;
use crate::plan::expr::ScanState;
use crate::plan::CompiledSummarize;
use crate::window::{EmitPolicy, WindowDescriptor, WindowFn};
use serde_json::Map;
use std::collections::{HashMap, HashSet};

/// Per-group-key bookkeeping. `aggregations` is keyed by window id when a
/// window is configured (one live window may be open per id, several at
/// once for an overlapping `hopping_window`) or holds a single entry under
/// `NO_WINDOW_ID` when there is no window.
struct GroupState {
    by_values: Vec<Document>,
    aggregations: HashMap<i64, AggregationObject>,
    last_emitted: Document,
    pushes_since_emit: i64,
}

/// Window id used for the single synthetic "no window" bucket a
/// windowless `summarize` keeps its one running aggregation under.
const NO_WINDOW_ID: i64 = 0;

pub struct SummarizeOperator {
    spec: CompiledSummarize,
    /// One window instance shared by every group: a window transition
    /// closes every live group at once, so the window's notion of
    /// "position" cannot be scoped to a single group.
    window: Option<Box<dyn WindowFn>>,
    /// Window ids currently open, shared across all groups.
    open_window_ids: HashSet<i64>,
    /// The descriptor for each currently (or just-closed) open window id.
    window_descriptors: HashMap<i64, WindowDescriptor>,
    groups: HashMap<String, GroupState>,
    /// The group key of the most recently pushed document — `emit on group
    /// change`'s only bookkeeping need.
    last_group_key: Option<String>,
    downstream: Downstream,
}

impl std::fmt::Debug for SummarizeOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizeOperator")
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl SummarizeOperator {
    pub fn new(spec: CompiledSummarize, downstream: Downstream) -> Self {
        let window = spec.window.as_ref().map(|(_, factory)| factory());
        Self {
            spec,
            window,
            open_window_ids: HashSet::new(),
            window_descriptors: HashMap::new(),
            groups: HashMap::new(),
            last_group_key: None,
            downstream,
        }
    }

    /// Emits and drops the aggregation `key` holds (if any) under
    /// `NO_WINDOW_ID` — used by `emit on group change` to flush a group the
    /// moment a document for a different group arrives.
    fn emit_and_drop_group(&mut self, key: &str) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        if let Some(agg) = group.aggregations.remove(&NO_WINDOW_ID) {
            let out = Self::build_output_static(&self.spec, &group.by_values, &agg, &Document::Null);
            self.downstream.push(out);
        }
        if group.aggregations.is_empty() {
            self.groups.remove(key);
        }
    }

    fn group_key(&self, item: &Document) -> (String, Vec<Document>) {
        let state = ScanState::new();
        let values: Vec<Document> = self
            .spec
            .by
            .iter()
            .map(|(_, expr)| expr.eval(item, &state))
            .collect();
        let key = serde_json::to_string(&values).unwrap_or_default();
        (key, values)
    }

    /// Emits (and drops) the aggregation held by every live group under
    /// `window_id`, then forgets that window's descriptor.
    fn close_window(&mut self, window_id: i64) {
        let descriptor_value = self
            .window_descriptors
            .remove(&window_id)
            .map(|d| d.to_value())
            .unwrap_or(Document::Null);

        let spec = &self.spec;
        let mut emitted = Vec::new();
        self.groups.retain(|_, group| {
            if let Some(agg) = group.aggregations.remove(&window_id) {
                emitted.push(Self::build_output_static(spec, &group.by_values, &agg, &descriptor_value));
            }
            !group.aggregations.is_empty()
        });
        for doc in emitted {
            self.downstream.push(doc);
        }
    }

    /// Free function form of `build_output` usable while `self.groups` is
    /// mutably borrowed by `retain`.
    fn build_output_static(
        spec: &CompiledSummarize,
        by_values: &[Document],
        agg: &AggregationObject,
        descriptor: &Document,
    ) -> Document {
        let mut map = Map::new();
        for ((name, _), value) in spec.by.iter().zip(by_values.iter()) {
            map.insert(name.clone(), value.clone());
        }
        if let Document::Object(fields) = agg.get_result(descriptor) {
            for (k, v) in fields {
                map.insert(k, v);
            }
        }
        Document::Object(map)
    }

    fn push_windowed(&mut self, item: Document) {
        let (key, by_values) = self.group_key(&item);
        let descriptors = self
            .window
            .as_mut()
            .expect("push_windowed only called with a window configured")
            .descriptors_for(&item);
        let new_ids: HashSet<i64> = descriptors.iter().map(|d| d.window_id).collect();

        let closing: Vec<i64> = self
            .open_window_ids
            .iter()
            .copied()
            .filter(|id| !new_ids.contains(id))
            .collect();
        for id in closing {
            self.open_window_ids.remove(&id);
            self.close_window(id);
        }

        for d in &descriptors {
            self.open_window_ids.insert(d.window_id);
            self.window_descriptors.insert(d.window_id, d.clone());
        }

        let template = &self.spec.template;
        let group = self.groups.entry(key).or_insert_with(|| GroupState {
            by_values,
            aggregations: HashMap::new(),
            last_emitted: Document::Null,
            pushes_since_emit: 0,
        });
        for d in &descriptors {
            let agg = group
                .aggregations
                .entry(d.window_id)
                .or_insert_with(|| AggregationObject::from_template(template));
            agg.push(&item);
        }
    }

    fn push_unwindowed(&mut self, item: Document) {
        let (key, by_values) = self.group_key(&item);

        // `emit on group change` fires on the *transition* rather than on
        // every document: the moment a document for a different group
        // arrives, the previous group's result is flushed and forgotten,
        // before this document touches its own (possibly new) group.
        if matches!(self.spec.emit, Some(EmitPolicy::OnGroupChange)) {
            if let Some(prev) = &self.last_group_key {
                if prev != &key {
                    let prev = prev.clone();
                    self.emit_and_drop_group(&prev);
                }
            }
            self.last_group_key = Some(key.clone());
        }

        let template = &self.spec.template;
        let group = self.groups.entry(key).or_insert_with(|| GroupState {
            by_values: by_values.clone(),
            aggregations: HashMap::new(),
            last_emitted: Document::Null,
            pushes_since_emit: 0,
        });
        let agg = group
            .aggregations
            .entry(NO_WINDOW_ID)
            .or_insert_with(|| AggregationObject::from_template(template));
        agg.push(&item);
        group.pushes_since_emit += 1;

        // Without a window or an explicit `emit` clause there is no
        // per-document emission signal at all — an empty `summarize {}`
        // with no window emits a single empty object on flush, and results
        // only surface on flush in general.
        let descriptor_value = Document::Null;
        let should_emit = match &self.spec.emit {
            None => false,
            Some(EmitPolicy::Every(n)) => group.pushes_since_emit >= *n,
            Some(EmitPolicy::OnUpdate) => agg.changed(),
            // Handled above, on the transition itself.
            Some(EmitPolicy::OnGroupChange) => false,
            Some(EmitPolicy::OnChangeOf(field)) => {
                let current = agg.get_result(&descriptor_value);
                crate::window::field_value(&current, field)
                    != crate::window::field_value(&group.last_emitted, field)
            }
        };

        if should_emit {
            let out = {
                let mut map = Map::new();
                for ((name, _), value) in self.spec.by.iter().zip(by_values.iter()) {
                    map.insert(name.clone(), value.clone());
                }
                if let Document::Object(fields) = agg.get_result(&descriptor_value) {
                    for (k, v) in fields {
                        map.insert(k, v);
                    }
                }
                Document::Object(map)
            };
            agg.mark_change_checked();
            group.last_emitted = out.clone();
            group.pushes_since_emit = 0;
            self.downstream.push(out);
        }
    }
}

impl Operator for SummarizeOperator {
    fn push(&mut self, item: Document) {
        if self.spec.window.is_some() {
            self.push_windowed(item);
        } else {
            self.push_unwindowed(item);
        }
    }

    fn flush(&mut self) {
        if self.spec.window.is_some() {
            let ids: Vec<i64> = self.open_window_ids.drain().collect();
            for id in ids {
                self.close_window(id);
            }
        } else {
            let spec = &self.spec;
            let mut emitted = Vec::new();
            for group in self.groups.values() {
                if let Some(agg) = group.aggregations.get(&NO_WINDOW_ID) {
                    emitted.push(Self::build_output_static(spec, &group.by_values, agg, &Document::Null));
                }
            }
            for doc in emitted {
                self.downstream.push(doc);
            }
            self.groups.clear();
        }
        self.downstream.flush();
    }
}
