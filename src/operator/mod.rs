//! Operator chain: the synchronous `push -> process -> emit` call chain a
//! pipeline compiles down to. Each operator owns its downstream and
//! forwards emitted documents immediately, on the calling thread — there is
//! no queue or channel hop on the data path (`tokio` is reserved for TTL
//! timers and `runtime::PendingCounter`, not this chain).

mod filter;
mod insert_into;
mod scan;
mod select;
mod summarize;

pub use filter::FilterOperator;
pub use insert_into::InsertIntoOperator;
pub use scan::ScanOperator;
pub use select::SelectOperator;
pub use summarize::SummarizeOperator;

use crate::document::Document;
use std::fmt;

/// One stage of a compiled pipeline. `push` may itself call `downstream`
/// zero or more times (a `where` that drops a document calls it zero times;
/// `scan`'s `emit(...)` statements may call it more than once per input).
pub trait Operator: fmt::Debug + Send {
    fn push(&mut self, doc: Document);

    /// Force any buffered operator (only `summarize` over a window
    /// currently buffers) to emit its pending state. Default no-op covers
    /// every stateless operator.
    fn flush(&mut self) {}
}

/// Forwards every document downstream unchanged. Used both as the
/// terminal stage the transpiler appends when a pipeline has no explicit
/// `insert_into`, and as the subscriber-facing tap for ad-hoc, non-flow
/// pipelines.
#[derive(Debug)]
pub struct CollectOperator<F: FnMut(Document) + Send> {
    sink: F,
}

impl<F: FnMut(Document) + Send> CollectOperator<F> {
    pub fn new(sink: F) -> Self {
        Self { sink }
    }
}

impl<F: FnMut(Document) + Send> Operator for CollectOperator<F> {
    fn push(&mut self, doc: Document) {
        (self.sink)(doc);
    }
}

/// A boxed, dynamically dispatched downstream link — every operator but the
/// terminal one holds exactly one of these.
pub type Downstream = Box<dyn Operator>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_forwards_to_sink() {
        let mut seen = Vec::new();
        {
            let mut collect = CollectOperator::new(|doc| seen.push(doc));
            collect.push(json!({"a": 1}));
            collect.push(json!({"a": 2}));
        }
        assert_eq!(seen, vec![json!({"a": 1}), json!({"a": 2})]);
    }
}
