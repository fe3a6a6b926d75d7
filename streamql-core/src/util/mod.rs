//! Small shared helpers used by both the parser and (via re-export)
//! downstream transpiler/runtime code.

mod duration;
mod permissive_json;
mod safe_get;

pub use duration::parse_duration;
pub use permissive_json::parse_permissive;
pub use safe_get::{index_value, safe_get};
