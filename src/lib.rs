//! streamql — an in-process, real-time stream-processing engine for JSON
//! documents, driven by a pipe-oriented query language.
//!
//! `streamql_core` turns query text into a CST; this crate compiles that
//! CST into an executable operator chain (`plan`), runs it over named,
//! in-memory fan-out points (`stream`), and owns the flow lifecycle
//! (`engine::QueryEngine`). See `src/bin/streamql-repl.rs` for a runnable
//! entry point.

pub mod aggregation;
pub mod document;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operator;
pub mod plan;
pub mod runtime;
pub mod stream;
pub mod window;

pub use document::Document;
pub use engine::{ExecuteOutcome, FlowEvent, FlowInfo, FlowState, QueryEngine};
pub use error::{EngineError, EngineResult};
pub use runtime::PendingCounter;
pub use stream::{StreamManager, SYSTEM_LOG_STREAM};
