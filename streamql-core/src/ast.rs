//! Concrete syntax tree produced by the parser.
//!
//! Mirrors the query-language grammar in one-to-one fashion; no rewriting
//! happens here (that is the transpiler's job, one layer up in `streamql`).

use serde_json::Value;

/// A parsed top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `create flow <name> [ttl(<duration>)] as <pipeline>`
    CreateFlow(CreateFlow),
    /// A standalone pipeline, executed ad-hoc.
    Pipeline(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFlow {
    pub name: String,
    /// Raw duration text from `ttl(...)`, e.g. "5m".
    pub ttl: Option<String>,
    pub pipeline: Pipeline,
}

/// `source | op | op | ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub source: String,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Where(Expression),
    Select(ObjectLiteral),
    Scan(Vec<ScanStep>),
    Summarize(SummarizeSpec),
    InsertInto(String),
    Collect,
}

/// `select { key: expr, ...spread, -exclude }`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectLiteral {
    pub fields: Vec<ObjectField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectField {
    Pair(String, Expression),
    Spread(Expression),
    Exclude(String),
}

/// `step <name>: <condition> => <statement>, <statement>, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStep {
    pub name: String,
    pub condition: Expression,
    pub statements: Vec<ScanStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanStatement {
    /// `field = expr` — writes into the current step's match state.
    Assign(String, Expression),
    /// `emit(expr)` — forwards the evaluated expression downstream.
    Emit(Expression),
}

/// `summarize <template> [by <expr>, ...] [over <name> = <windowCall>] [emit <emitClause>]`
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizeSpec {
    pub template: ObjectLiteral,
    pub by: Vec<Expression>,
    pub window: Option<(String, WindowCall)>,
    pub emit: Option<EmitClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowCall {
    pub kind: WindowKind,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Tumbling,
    TumblingBy,
    Hopping,
    HoppingBy,
    Sliding,
    SlidingBy,
    Count,
    Session,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmitClause {
    Every(Expression),
    OnChangeOf(String),
    OnGroupChange,
    OnUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// Bare identifier, e.g. `foo` — resolved against the bound item (or, in
    /// scan bodies, possibly the step state) by the transpiler.
    Variable(String),
    /// `base.field`
    FieldAccess(Box<Expression>, String),
    /// `base[index]`
    Index(Box<Expression>, Box<Expression>),
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryMinus(Box<Expression>),
    /// Function call, including `iff(cond, a, b)`. Whether `name` denotes a
    /// scalar function, an aggregation, or an unknown identifier is resolved
    /// by the transpiler using its function registry.
    Call {
        name: String,
        args: Vec<Expression>,
    },
    Object(ObjectLiteral),
    Array(Vec<Expression>),
    /// Standalone `...expr` used as a primary expression (object/array spread).
    Spread(Box<Expression>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_equality() {
        let a = Expression::Variable("age".to_string());
        let b = Expression::Variable("age".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_object_literal_default_empty() {
        let obj = ObjectLiteral::default();
        assert!(obj.fields.is_empty());
    }
}
