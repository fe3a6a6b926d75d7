//! Emit policies: an alternative to `over <window>` for deciding when a
//! `summarize` result is published. Mutually exclusive with a window
//! — the transpiler rejects specs with both (`InvalidSpec`).
//!
//! The policy itself is just a descriptor; the bookkeeping it needs (a
//! per-group document counter, the last-seen value of a tracked field, the
//! last-seen group key) lives in `operator::summarize`, since that's the
//! only place with access to per-group aggregation state.

use crate::document::Document;
use streamql_core::Expression;

#[derive(Debug, Clone)]
pub enum EmitPolicy {
    /// `emit every N` — emit after every `N`th document observed by the
    /// touched group.
    Every(i64),
    /// `emit on change of <field>` — emit when the named field of the
    /// group's result differs from its previous emission.
    OnChangeOf(String),
    /// `emit on group change` — emit the *previous* group's result the
    /// moment a document for a different group arrives.
    OnGroupChange,
    /// `emit on update` — emit whenever the aggregation's own state
    /// actually changed since the last emission (distinct from the default,
    /// unconditional per-document emission a `summarize` with no `emit`
    /// clause uses).
    OnUpdate,
}

impl EmitPolicy {
    pub fn from_ast(clause: &streamql_core::ast::EmitClause, literal_i64: impl Fn(&Expression) -> Option<i64>) -> Option<Self> {
        use streamql_core::ast::EmitClause as A;
        match clause {
            A::Every(expr) => literal_i64(expr).map(EmitPolicy::Every),
            A::OnChangeOf(field) => Some(EmitPolicy::OnChangeOf(field.clone())),
            A::OnGroupChange => Some(EmitPolicy::OnGroupChange),
            A::OnUpdate => Some(EmitPolicy::OnUpdate),
        }
    }
}

/// Resolves a possibly-missing document field into an owned value for
/// change comparison; used by `OnChangeOf`.
pub fn field_value(result: &Document, field: &str) -> serde_json::Value {
    streamql_core::safe_get(result, field)
}
