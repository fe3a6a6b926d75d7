//! Duration literal parsing: `"2m"`, `"500ms"`, `"30s"`, `"1h"`, `"1d"`, `"1w"`.

use crate::error::{QueryError, QueryResult};
use chrono::Duration;

/// Parse a duration literal of the form `<integer><unit>` where unit is one
/// of `ms`, `s`, `m`, `h`, `d`, `w`. Longer suffixes (`ms`) are matched
/// before shorter ones (`m`, `s`) so `"500ms"` is never misread as
/// `"500m" + "s"`.
pub fn parse_duration(text: &str) -> QueryResult<Duration> {
    let text = text.trim();

    let (digits, unit) = if let Some(d) = text.strip_suffix("ms") {
        (d, "ms")
    } else if let Some(d) = text.strip_suffix('s') {
        (d, "s")
    } else if let Some(d) = text.strip_suffix('m') {
        (d, "m")
    } else if let Some(d) = text.strip_suffix('h') {
        (d, "h")
    } else if let Some(d) = text.strip_suffix('d') {
        (d, "d")
    } else if let Some(d) = text.strip_suffix('w') {
        (d, "w")
    } else {
        return Err(QueryError::InvalidDuration(format!(
            "missing unit (expected ms|s|m|h|d|w): {text}"
        )));
    };

    let amount: i64 = digits
        .parse()
        .map_err(|_| QueryError::InvalidDuration(format!("invalid duration: {text}")))?;

    let duration = match unit {
        "ms" => Duration::milliseconds(amount),
        "s" => Duration::seconds(amount),
        "m" => Duration::minutes(amount),
        "h" => Duration::hours(amount),
        "d" => Duration::days(amount),
        "w" => Duration::weeks(amount),
        _ => unreachable!(),
    };

    Ok(duration)
}
