//! Transpiler / plan builder: walks the parsed CST and produces an
//! immutable `Plan` — a tree of operator-construction descriptors with
//! compiled expression trees in place of the CST's raw `Expression` nodes.
//!
//! Building a `Plan` is the one place that can fail after parsing succeeds
//! (unknown function names, `over`+`emit` used together, an empty `scan`);
//! `transpile` is a pure function of its input text.

pub mod expr;

use crate::aggregation::{AggregationExpression, AggregationTemplate};
use crate::error::{EngineError, EngineResult};
use crate::functions;
use crate::window::{self, EmitPolicy, WindowFn};
use expr::{Expr, ObjectFieldExpr};
use streamql_core::ast::{
    self, EmitClause, Operation, ScanStatement, Statement, SummarizeSpec, WindowCall, WindowKind,
};
use streamql_core::Expression;

/// An operator-construction descriptor: everything `engine::QueryEngine`
/// needs to instantiate the real `operator::*` chain for a parsed pipeline.
#[derive(Debug)]
pub enum PlanNode {
    Where(Expr),
    Select(Expr),
    Scan(Vec<CompiledScanStep>),
    Summarize(CompiledSummarize),
    InsertInto(String),
    Collect,
}

#[derive(Debug)]
pub struct CompiledScanStep {
    pub name: String,
    pub condition: Expr,
    pub statements: Vec<CompiledScanStatement>,
}

#[derive(Debug)]
pub enum CompiledScanStatement {
    Assign(String, Expr),
    Emit(Expr),
}

pub struct CompiledSummarize {
    pub template: AggregationTemplate,
    /// `(output field name, expression)` — the name is the bare identifier
    /// or final field of a `by` expression (`by product` -> `"product"`),
    /// falling back to a synthetic `group{n}` for computed `by` expressions.
    pub by: Vec<(String, Expr)>,
    pub window: Option<(String, Box<dyn Fn() -> Box<dyn WindowFn> + Send + Sync>)>,
    pub emit: Option<EmitPolicy>,
}

impl std::fmt::Debug for CompiledSummarize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSummarize")
            .field("template", &self.template)
            .field("by", &self.by)
            .field("window_name", &self.window.as_ref().map(|(n, _)| n))
            .field("emit", &self.emit)
            .finish()
    }
}

#[derive(Debug)]
pub struct Plan {
    pub source: String,
    pub nodes: Vec<PlanNode>,
}

#[derive(Debug)]
pub enum PlanStatement {
    CreateFlow {
        name: String,
        ttl: Option<chrono::Duration>,
        plan: Plan,
    },
    Pipeline(Plan),
}

/// Parse + transpile in one step.
pub fn transpile(source: &str) -> EngineResult<PlanStatement> {
    let statement = streamql_core::parse(source)?;
    build(statement)
}

fn build(statement: Statement) -> EngineResult<PlanStatement> {
    match statement {
        Statement::CreateFlow(flow) => {
            let ttl = flow
                .ttl
                .as_deref()
                .map(streamql_core::parse_duration)
                .transpose()?;
            let plan = build_pipeline(flow.pipeline)?;
            Ok(PlanStatement::CreateFlow {
                name: flow.name,
                ttl,
                plan,
            })
        }
        Statement::Pipeline(pipeline) => Ok(PlanStatement::Pipeline(build_pipeline(pipeline)?)),
    }
}

fn build_pipeline(pipeline: ast::Pipeline) -> EngineResult<Plan> {
    let nodes = pipeline
        .operations
        .into_iter()
        .map(build_operation)
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(Plan {
        source: pipeline.source,
        nodes,
    })
}

fn build_operation(op: Operation) -> EngineResult<PlanNode> {
    match op {
        Operation::Where(expr) => Ok(PlanNode::Where(compile_item_expr(&expr)?)),
        Operation::Select(obj) => {
            let fields = obj
                .fields
                .into_iter()
                .map(compile_object_field)
                .collect::<EngineResult<Vec<_>>>()?;
            Ok(PlanNode::Select(Expr::Object(fields)))
        }
        Operation::Scan(steps) => Ok(PlanNode::Scan(build_scan_steps(steps)?)),
        Operation::Summarize(spec) => Ok(PlanNode::Summarize(build_summarize(spec)?)),
        Operation::InsertInto(name) => Ok(PlanNode::InsertInto(name)),
        Operation::Collect => Ok(PlanNode::Collect),
    }
}

// ---------------------------------------------------------------------
// Plain (non-scan, non-aggregation) expression compilation.
// ---------------------------------------------------------------------

fn compile_item_expr(expr: &Expression) -> EngineResult<Expr> {
    compile_expr(expr, &[], None)
}

fn compile_object_field(field: ast::ObjectField) -> EngineResult<ObjectFieldExpr> {
    Ok(match field {
        ast::ObjectField::Pair(key, expr) => ObjectFieldExpr::Pair(key, compile_item_expr(&expr)?),
        ast::ObjectField::Spread(expr) => ObjectFieldExpr::Spread(compile_item_expr(&expr)?),
        ast::ObjectField::Exclude(key) => ObjectFieldExpr::Exclude(key),
    })
}

/// `step_names` lists every step name visible in the current `scan`, so a
/// bare `s1` (or `s1.x`) resolves against `state` rather than `item`.
/// `current_step`, when set, additionally makes *other* bare identifiers
/// fall back to that step's own accumulated state before trying `item` —
/// the mechanism that lets `n = n + 1` in step `act`'s body mean "my own
/// running `n`", not "the incoming document's `n`".
fn compile_expr(expr: &Expression, step_names: &[String], current_step: Option<&str>) -> EngineResult<Expr> {
    let compiled = match expr {
        Expression::Literal(v) => Expr::Literal(v.clone()),
        Expression::Variable(name) => compile_variable(name, step_names, current_step),
        Expression::FieldAccess(base, field) => Expr::Field(
            Box::new(compile_expr(base, step_names, current_step)?),
            field.clone(),
        ),
        Expression::Index(base, index) => Expr::Index(
            Box::new(compile_expr(base, step_names, current_step)?),
            Box::new(compile_expr(index, step_names, current_step)?),
        ),
        Expression::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(compile_expr(left, step_names, current_step)?),
            op: *op,
            right: Box::new(compile_expr(right, step_names, current_step)?),
        },
        Expression::UnaryMinus(inner) => {
            Expr::UnaryMinus(Box::new(compile_expr(inner, step_names, current_step)?))
        }
        Expression::Call { name, args } => {
            if !functions::is_scalar_name(name) {
                return Err(EngineError::InvalidSpec(format!(
                    "unknown function used as scalar: {name}"
                )));
            }
            let args = args
                .iter()
                .map(|a| compile_expr(a, step_names, current_step))
                .collect::<EngineResult<Vec<_>>>()?;
            Expr::Call {
                name: name.clone(),
                args,
            }
        }
        Expression::Object(obj) => {
            let fields = obj
                .fields
                .iter()
                .map(|f| compile_scan_object_field(f, step_names, current_step))
                .collect::<EngineResult<Vec<_>>>()?;
            Expr::Object(fields)
        }
        Expression::Array(items) => Expr::Array(
            items
                .iter()
                .map(|i| compile_expr(i, step_names, current_step))
                .collect::<EngineResult<Vec<_>>>()?,
        ),
        Expression::Spread(inner) => {
            Expr::Spread(Box::new(compile_expr(inner, step_names, current_step)?))
        }
    };
    Ok(compiled)
}

fn compile_scan_object_field(
    field: &ast::ObjectField,
    step_names: &[String],
    current_step: Option<&str>,
) -> EngineResult<ObjectFieldExpr> {
    Ok(match field {
        ast::ObjectField::Pair(key, expr) => {
            ObjectFieldExpr::Pair(key.clone(), compile_expr(expr, step_names, current_step)?)
        }
        ast::ObjectField::Spread(expr) => {
            ObjectFieldExpr::Spread(compile_expr(expr, step_names, current_step)?)
        }
        ast::ObjectField::Exclude(key) => ObjectFieldExpr::Exclude(key.clone()),
    })
}

fn compile_variable(name: &str, step_names: &[String], current_step: Option<&str>) -> Expr {
    if name == "item" {
        return Expr::ItemRoot;
    }
    if name == "matchId" {
        return Expr::MatchIdRef;
    }
    if step_names.iter().any(|s| s == name) {
        return Expr::StateRoot(name.to_string());
    }
    match current_step {
        Some(step) => Expr::SelfField(step.to_string(), name.to_string()),
        None => Expr::Field(Box::new(Expr::ItemRoot), name.to_string()),
    }
}

// ---------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------

fn build_scan_steps(steps: Vec<ast::ScanStep>) -> EngineResult<Vec<CompiledScanStep>> {
    if steps.is_empty() {
        return Err(EngineError::InvalidSpec(
            "scan requires at least one step".to_string(),
        ));
    }
    let step_names: Vec<String> = steps.iter().map(|s| s.name.clone()).collect();

    steps
        .into_iter()
        .map(|step| {
            let condition = compile_expr(&step.condition, &step_names, None)?;
            let statements = step
                .statements
                .into_iter()
                .map(|stmt| build_scan_statement(stmt, &step_names, &step.name))
                .collect::<EngineResult<Vec<_>>>()?;
            Ok(CompiledScanStep {
                name: step.name,
                condition,
                statements,
            })
        })
        .collect()
}

fn build_scan_statement(
    stmt: ScanStatement,
    step_names: &[String],
    current_step: &str,
) -> EngineResult<CompiledScanStatement> {
    Ok(match stmt {
        ScanStatement::Assign(field, expr) => {
            CompiledScanStatement::Assign(field, compile_expr(&expr, step_names, Some(current_step))?)
        }
        ScanStatement::Emit(expr) => {
            CompiledScanStatement::Emit(compile_expr(&expr, step_names, Some(current_step))?)
        }
    })
}

// ---------------------------------------------------------------------
// Summarize
// ---------------------------------------------------------------------

fn build_summarize(spec: SummarizeSpec) -> EngineResult<CompiledSummarize> {
    if spec.window.is_some() && spec.emit.is_some() {
        return Err(EngineError::InvalidSpec(
            "summarize cannot combine `over` and `emit`".to_string(),
        ));
    }

    let template = build_aggregation_template(&spec.template, spec.window.as_ref().map(|(n, _)| n.as_str()))?;
    let by = spec
        .by
        .iter()
        .enumerate()
        .map(|(i, expr)| Ok((by_field_name(expr, i), compile_item_expr(expr)?)))
        .collect::<EngineResult<Vec<_>>>()?;

    let window = spec
        .window
        .map(|(name, call)| build_window_factory(call).map(|f| (name, f)))
        .transpose()?;

    let emit = spec
        .emit
        .map(|clause| build_emit_policy(&clause))
        .transpose()?
        .flatten();

    Ok(CompiledSummarize {
        template,
        by,
        window,
        emit,
    })
}

fn by_field_name(expr: &Expression, index: usize) -> String {
    match expr {
        Expression::Variable(name) => name.clone(),
        Expression::FieldAccess(_, field) => field.clone(),
        _ => format!("group{index}"),
    }
}

fn build_aggregation_template(
    obj: &ast::ObjectLiteral,
    window_name: Option<&str>,
) -> EngineResult<AggregationTemplate> {
    let mut fields = Vec::new();
    for field in &obj.fields {
        match field {
            ast::ObjectField::Pair(key, expr) => {
                fields.push((key.clone(), build_aggregation_node(expr, window_name)?));
            }
            ast::ObjectField::Spread(_) | ast::ObjectField::Exclude(_) => {
                return Err(EngineError::InvalidSpec(
                    "summarize templates only support static `key: expr` fields".to_string(),
                ));
            }
        }
    }
    Ok(AggregationTemplate::Object(fields))
}

fn build_aggregation_node(expr: &Expression, window_name: Option<&str>) -> EngineResult<AggregationTemplate> {
    Ok(match expr {
        Expression::Literal(v) => AggregationTemplate::Literal(v.clone()),
        Expression::Variable(name) if Some(name.as_str()) == window_name => AggregationTemplate::WindowRef,
        Expression::Object(obj) => {
            let mut fields = Vec::new();
            for field in &obj.fields {
                match field {
                    ast::ObjectField::Pair(key, value) => {
                        fields.push((key.clone(), build_aggregation_node(value, window_name)?));
                    }
                    _ => {
                        return Err(EngineError::InvalidSpec(
                            "aggregation object fields must be static `key: expr`".to_string(),
                        ))
                    }
                }
            }
            AggregationTemplate::Object(fields)
        }
        Expression::Array(items) => AggregationTemplate::Array(
            items
                .iter()
                .map(|i| build_aggregation_node(i, window_name))
                .collect::<EngineResult<Vec<_>>>()?,
        ),
        Expression::Call { name, args } => build_aggregation_call(name, args, window_name)?,
        other => AggregationTemplate::Leaf(AggregationExpression::safe_get(compile_item_expr(other)?)),
    })
}

fn build_aggregation_call(
    name: &str,
    args: &[Expression],
    window_name: Option<&str>,
) -> EngineResult<AggregationTemplate> {
    if functions::is_aggregation_name(name) {
        let children = args
            .iter()
            .map(compile_item_expr)
            .collect::<EngineResult<Vec<_>>>()?;
        let node = AggregationExpression::aggregation(name.to_string(), children)
            .ok_or_else(|| EngineError::InvalidSpec(format!("unknown aggregation: {name}")))?;
        return Ok(AggregationTemplate::Leaf(node));
    }
    if functions::is_scalar_name(name) {
        let children = args
            .iter()
            .map(|a| build_aggregation_node(a, window_name))
            .collect::<EngineResult<Vec<_>>>()?
            .into_iter()
            .map(leaf_or_wrap)
            .collect();
        return Ok(AggregationTemplate::Leaf(AggregationExpression::scalar(
            name.to_string(),
            children,
        )));
    }
    Err(EngineError::InvalidSpec(format!("unknown function: {name}")))
}

/// A scalar's children must themselves be `AggregationExpression`s (to allow
/// `exp(sum(x))`); a nested static/structural template has no meaning there,
/// so this only ever unwraps `Leaf` nodes produced by `build_aggregation_node`
/// for call expressions.
fn leaf_or_wrap(template: AggregationTemplate) -> AggregationExpression {
    match template {
        AggregationTemplate::Leaf(expr) => expr,
        AggregationTemplate::Literal(v) => AggregationExpression::safe_get(Expr::Literal(v)),
        AggregationTemplate::WindowRef => AggregationExpression::safe_get(Expr::Literal(serde_json::Value::Null)),
        AggregationTemplate::Object(_) | AggregationTemplate::Array(_) => {
            AggregationExpression::safe_get(Expr::Literal(serde_json::Value::Null))
        }
    }
}

fn build_window_factory(
    call: WindowCall,
) -> EngineResult<Box<dyn Fn() -> Box<dyn WindowFn> + Send + Sync>> {
    let args = call.args;
    let literal = |i: usize| -> EngineResult<f64> {
        args.get(i)
            .and_then(window::literal_window_arg)
            .ok_or_else(|| EngineError::InvalidSpec("window function expects a literal size/duration".to_string()))
    };
    let field = |i: usize| -> EngineResult<String> {
        match args.get(i) {
            Some(Expression::Variable(name)) => Ok(name.clone()),
            Some(Expression::Literal(serde_json::Value::String(s))) => Ok(s.clone()),
            _ => Err(EngineError::InvalidSpec(
                "window function expects a field name argument".to_string(),
            )),
        }
    };

    let factory: Box<dyn Fn() -> Box<dyn WindowFn> + Send + Sync> = match call.kind {
        WindowKind::Tumbling => {
            let size = literal(0)? as i64;
            Box::new(move || window::tumbling_window(size))
        }
        WindowKind::TumblingBy => {
            let size = literal(0)?;
            let field = field(1)?;
            Box::new(move || window::tumbling_window_by(size, field.clone()))
        }
        WindowKind::Hopping => {
            let size = literal(0)? as i64;
            let hop = literal(1)? as i64;
            Box::new(move || window::hopping_window(size, hop))
        }
        WindowKind::HoppingBy => {
            let size = literal(0)?;
            let hop = literal(1)?;
            let field = field(2)?;
            Box::new(move || window::hopping_window_by(size, hop, field.clone()))
        }
        WindowKind::Sliding => {
            let size = literal(0)? as i64;
            Box::new(move || window::sliding_window(size))
        }
        WindowKind::SlidingBy => {
            let size = literal(0)?;
            let field = field(1)?;
            Box::new(move || window::sliding_window_by(size, field.clone()))
        }
        WindowKind::Count => {
            let n = literal(0)? as i64;
            Box::new(move || window::count_window(n))
        }
        WindowKind::Session => {
            let timeout = literal(0)? as i64;
            let field = field(1)?;
            Box::new(move || window::session_window(timeout, field.clone()))
        }
    };
    Ok(factory)
}

fn build_emit_policy(clause: &EmitClause) -> EngineResult<Option<EmitPolicy>> {
    let literal_i64 = |expr: &Expression| match expr {
        Expression::Literal(v) => v.as_i64(),
        _ => None,
    };
    EmitPolicy::from_ast(clause, literal_i64)
        .map(Some)
        .ok_or_else(|| EngineError::InvalidSpec("emit every expects an integer literal".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpile_is_pure() {
        let a = transpile("orders | where amount > 100").unwrap();
        let b = transpile("orders | where amount > 100").unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn test_over_and_emit_together_is_invalid_spec() {
        let err = transpile(
            "s | summarize { c: count() } over w = tumbling_window(2) emit on update",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec(_)));
    }

    #[test]
    fn test_unknown_function_fails_plan() {
        let err = transpile("s | where bogus_fn(x)").unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec(_)));
    }

    #[test]
    fn test_build_select_plan() {
        let plan = transpile("s | select { a, b: a + 1 }").unwrap();
        match plan {
            PlanStatement::Pipeline(p) => assert_eq!(p.nodes.len(), 1),
            _ => panic!("expected pipeline"),
        }
    }
}
