//! Permissive JSON accepted by `insert into`: unquoted identifier-shaped
//! keys are treated as quoted. Attempt a strict `serde_json` parse first;
//! on failure, wrap bare-identifier keys in quotes with a narrow regex and
//! retry; if that still fails, surface the original strict error so a
//! genuinely malformed document isn't silently mangled into something else.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Matches an unquoted object key: `{` or `,` (optionally followed by
/// whitespace/newlines), then an identifier, then `:`. Narrow by design —
/// it doesn't track quote nesting, so a string value containing its own
/// `, word:` sequence can confuse it. Only runs once the strict parse has
/// already failed.
static UNQUOTED_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)"#).expect("static regex is valid")
});

/// Parses `text` as JSON, falling back to quoting bare identifier keys if
/// the strict parse fails.
pub fn parse_permissive(text: &str) -> serde_json::Result<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let quoted = UNQUOTED_KEY.replace_all(text, r#"$1"$2"$3"#);
            match serde_json::from_str(&quoted) {
                Ok(value) => Ok(value),
                Err(_) => Err(strict_err),
            }
        }
    }
}
