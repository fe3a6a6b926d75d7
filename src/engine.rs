//! `QueryEngine`: parses/transpiles statements, realises plans into operator
//! chains, and owns the flow lifecycle (`created -> active ->
//! {stopped|expired}`). TTL expiry is the one asynchronous concern in the
//! whole engine — scheduled via `tokio::spawn` + `tokio::time::sleep` around
//! an otherwise single-threaded, synchronous data path.

use crate::document::Document;
use crate::error::{EngineError, EngineResult};
use crate::operator::{CollectOperator, FilterOperator, InsertIntoOperator, Operator, ScanOperator, SelectOperator, SummarizeOperator};
use crate::plan::{self, Plan, PlanNode, PlanStatement};
use crate::stream::{StreamManager, Subscriber};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Created,
    Active,
    Stopped,
    Expired,
}

#[derive(Debug, Clone)]
pub enum FlowEvent {
    Created { id: u64, name: Option<String> },
    Activated { id: u64 },
    Stopped { id: u64 },
    Expired { id: u64 },
}

#[derive(Debug, Clone)]
pub struct FlowInfo {
    pub id: u64,
    pub name: Option<String>,
    pub source: String,
    pub state: FlowState,
}

#[derive(Debug, Clone)]
pub struct ExecuteOutcome {
    pub id: u64,
    pub name: Option<String>,
}

/// Adapts a boxed operator chain (`operator::Operator`) to the
/// `stream::Subscriber` interface a `Stream` fans out to.
struct OperatorHead(Box<dyn Operator>);

impl std::fmt::Debug for OperatorHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OperatorHead").field(&self.0).finish()
    }
}

impl Subscriber for OperatorHead {
    fn on_document(&mut self, doc: &Document) {
        self.0.push(doc.clone());
    }
}

struct FlowHandle {
    id: u64,
    name: Option<String>,
    source: String,
    chain: Arc<Mutex<OperatorHead>>,
    subscription_id: u64,
    state: FlowState,
    ttl_task: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Clone)]
pub struct QueryEngine {
    streams: StreamManager,
    flows: Arc<Mutex<HashMap<u64, FlowHandle>>>,
    next_flow_id: Arc<AtomicU64>,
    listeners: Arc<Mutex<Vec<Box<dyn FnMut(FlowEvent) + Send>>>>,
}

impl QueryEngine {
    pub fn new(streams: StreamManager) -> Self {
        Self {
            streams,
            flows: Arc::new(Mutex::new(HashMap::new())),
            next_flow_id: Arc::new(AtomicU64::new(1)),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn streams(&self) -> &StreamManager {
        &self.streams
    }

    /// Parses and transpiles `text` without installing anything — useful
    /// for `explain`-style introspection of what a statement would do.
    pub fn explain_statement(&self, text: &str) -> EngineResult<String> {
        let statement = plan::transpile(text)?;
        Ok(format!("{statement:?}"))
    }

    /// Parses `text` and installs it as a flow (named, from `create flow`,
    /// or anonymous, from a bare pipeline). `on_result` is the callback the
    /// default `collect` sink forwards to when the plan has no explicit
    /// `insert_into` — on any lexer/parser/bind error, returns a typed
    /// failure with no side effects.
    pub fn execute_statement(
        &self,
        text: &str,
        on_result: impl FnMut(Document) + Send + 'static,
    ) -> EngineResult<ExecuteOutcome> {
        match plan::transpile(text)? {
            PlanStatement::CreateFlow { name, ttl, plan } => {
                self.install_flow(Some(name), plan, ttl, on_result)
            }
            PlanStatement::Pipeline(plan) => self.install_flow(None, plan, None, Box::new(on_result)),
        }
    }

    fn install_flow(
        &self,
        name: Option<String>,
        plan: Plan,
        ttl: Option<chrono::Duration>,
        on_result: impl FnMut(Document) + Send + 'static,
    ) -> EngineResult<ExecuteOutcome> {
        if let Some(name) = &name {
            let flows = self.flows.lock();
            if flows.values().any(|f| f.name.as_deref() == Some(name.as_str())) {
                return Err(EngineError::DuplicateFlow(name.clone()));
            }
        }
        if !self.streams.stream_exists(&plan.source) {
            return Err(EngineError::UnknownStream(plan.source.clone()));
        }

        let id = self.next_flow_id.fetch_add(1, Ordering::SeqCst);
        let source = plan.source.clone();
        let chain = build_chain(plan.nodes, self.streams.clone(), Box::new(on_result));
        let head: Arc<Mutex<OperatorHead>> = Arc::new(Mutex::new(OperatorHead(chain)));
        let subscription_id = self.streams.subscribe(&source, head.clone())?;

        let ttl_task = ttl.map(|duration| {
            let engine = self.clone();
            let flow_id = id;
            let sleep_for = duration.to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::spawn(async move {
                tokio::time::sleep(sleep_for).await;
                engine.expire_flow(flow_id);
            })
        });

        self.flows.lock().insert(
            id,
            FlowHandle {
                id,
                name: name.clone(),
                source,
                chain: head,
                subscription_id,
                state: FlowState::Active,
                ttl_task,
            },
        );

        self.fire(FlowEvent::Created { id, name: name.clone() });
        self.fire(FlowEvent::Activated { id });
        Ok(ExecuteOutcome { id, name })
    }

    /// Unsubscribes, cancels any TTL timer, best-effort flushes the chain,
    /// and fires `flow-deleted`.
    pub fn stop_query(&self, id: u64) -> EngineResult<()> {
        let handle = self.flows.lock().remove(&id);
        let Some(mut handle) = handle else {
            return Err(EngineError::UnknownFlow(id.to_string()));
        };
        self.teardown(&mut handle);
        self.fire(FlowEvent::Stopped { id });
        Ok(())
    }

    pub fn stop_flow_by_name(&self, name: &str) -> EngineResult<()> {
        let id = {
            let flows = self.flows.lock();
            flows
                .values()
                .find(|f| f.name.as_deref() == Some(name))
                .map(|f| f.id)
        };
        match id {
            Some(id) => self.stop_query(id),
            None => Err(EngineError::UnknownFlow(name.to_string())),
        }
    }

    fn expire_flow(&self, id: u64) {
        let handle = self.flows.lock().remove(&id);
        if let Some(mut handle) = handle {
            self.teardown(&mut handle);
            self.fire(FlowEvent::Expired { id });
        }
    }

    fn teardown(&self, handle: &mut FlowHandle) {
        self.streams.unsubscribe(&handle.source, handle.subscription_id);
        if let Some(task) = handle.ttl_task.take() {
            task.abort();
        }
        handle.chain.lock().0.flush();
        handle.state = FlowState::Stopped;
    }

    /// Stream deletion cascades to every flow reading from it — route
    /// deletes through the engine, not `StreamManager` directly, so that
    /// cascade actually happens.
    pub fn delete_stream(&self, name: &str) -> EngineResult<()> {
        let dependents: Vec<u64> = self
            .flows
            .lock()
            .values()
            .filter(|f| f.source == name)
            .map(|f| f.id)
            .collect();
        for id in dependents {
            let _ = self.stop_query(id);
        }
        self.streams.delete_stream(name)
    }

    /// `flush <name>`: force every flow reading from `name` to emit whatever
    /// buffered state it's holding (a windowed `summarize` with still-open
    /// windows), without stopping the flow.
    pub fn flush_source(&self, name: &str) -> EngineResult<()> {
        if !self.streams.stream_exists(name) {
            return Err(EngineError::UnknownStream(name.to_string()));
        }
        let chains: Vec<Arc<Mutex<OperatorHead>>> = self
            .flows
            .lock()
            .values()
            .filter(|f| f.source == name)
            .map(|f| f.chain.clone())
            .collect();
        for chain in chains {
            chain.lock().0.flush();
        }
        Ok(())
    }

    pub fn list_active_flows(&self) -> Vec<FlowInfo> {
        self.flows
            .lock()
            .values()
            .map(|f| FlowInfo {
                id: f.id,
                name: f.name.clone(),
                source: f.source.clone(),
                state: f.state.clone(),
            })
            .collect()
    }

    pub fn on_flow_event(&self, cb: impl FnMut(FlowEvent) + Send + 'static) {
        self.listeners.lock().push(Box::new(cb));
    }

    fn fire(&self, event: FlowEvent) {
        for cb in self.listeners.lock().iter_mut() {
            cb(event.clone());
        }
    }
}

/// Realises a `Plan`'s node list into a live `operator::Operator` chain,
/// appending a default `collect` sink when the plan has no explicit
/// `insert_into`.
fn build_chain(
    mut nodes: Vec<PlanNode>,
    manager: StreamManager,
    on_result: Box<dyn FnMut(Document) + Send>,
) -> Box<dyn Operator> {
    if !matches!(nodes.last(), Some(PlanNode::InsertInto(_))) {
        nodes.push(PlanNode::Collect);
    }

    let mut rev = nodes.into_iter().rev();
    let mut chain: Box<dyn Operator> = match rev.next().expect("at least the appended sink") {
        PlanNode::InsertInto(name) => Box::new(InsertIntoOperator::new(name, manager.clone())),
        PlanNode::Collect => Box::new(CollectOperator::new(on_result)),
        other => unreachable!("sink position always InsertInto or Collect, got {other:?}"),
    };

    for node in rev {
        chain = match node {
            PlanNode::Where(expr) => Box::new(FilterOperator::new(expr, chain)),
            PlanNode::Select(expr) => Box::new(SelectOperator::new(expr, chain)),
            PlanNode::Scan(steps) => Box::new(ScanOperator::new(steps, chain)),
            PlanNode::Summarize(spec) => Box::new(SummarizeOperator::new(spec, chain)),
            PlanNode::InsertInto(name) => Box::new(InsertIntoOperator::new(name, manager.clone())),
            PlanNode::Collect => chain,
        };
    }
    chain
}
