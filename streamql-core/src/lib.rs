//! streamql-core — storage-independent front end for the streamql query
//! language: lexer, parser, AST and small shared utilities.
//!
//! This crate has no knowledge of streams, operators, or runtime state; it
//! only turns query text into a [`ast::Statement`]. The `streamql` crate
//! (one layer up) compiles that statement into an executable operator graph.
//!
//! # Example
//!
//! ```rust
//! use streamql_core::parse;
//!
//! let statement = parse("orders | where amount > 100 | select { amount, region }").unwrap();
//! match statement {
//!     streamql_core::ast::Statement::Pipeline(pipeline) => {
//!         assert_eq!(pipeline.source, "orders");
//!         assert_eq!(pipeline.operations.len(), 2);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod util;

pub use ast::{BinaryOperator, Expression, Operation, Pipeline, Statement};
pub use error::{QueryError, QueryResult, SyntaxError};
pub use lexer::{Lexer, Token};
pub use parser::{parse, Parser};
pub use util::{index_value, parse_duration, parse_permissive, safe_get};
