use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::error::{Result, ToolError};

/// Unix epoch seconds.
pub type EpochSeconds = i64;

pub const MINUTE: EpochSeconds = 60;
pub const HOUR: EpochSeconds = 3_600;
pub const DAY: EpochSeconds = 86_400;

static RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-(\d+)([mhd])$").expect("relative time pattern"));

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Resolve a time designator against `now`.
///
/// `-15m`, `-2h` and `-7d` are offsets back from `now`. Anything else must be
/// an absolute timestamp: RFC 3339, a naive date-time (taken as UTC) or a bare
/// `YYYY-MM-DD` date (midnight UTC).
pub fn resolve(expr: &str, now: EpochSeconds) -> Result<EpochSeconds> {
    let expr = expr.trim();
    if let Some(caps) = RELATIVE.captures(expr) {
        let unit = match &caps[2] {
            "m" => MINUTE,
            "h" => HOUR,
            _ => DAY,
        };
        return caps[1]
            .parse::<i64>()
            .ok()
            .and_then(|value| value.checked_mul(unit))
            .and_then(|offset| now.checked_sub(offset))
            .ok_or_else(|| ToolError::InvalidTimeExpression(expr.to_string()));
    }

    parse_absolute(expr).ok_or_else(|| ToolError::InvalidTimeExpression(expr.to_string()))
}

/// Resolve an optional designator, falling back to `default` when absent.
pub fn resolve_or(
    expr: Option<&str>,
    default: EpochSeconds,
    now: EpochSeconds,
) -> Result<EpochSeconds> {
    match expr {
        Some(expr) => resolve(expr, now),
        None => Ok(default),
    }
}

/// Format epoch seconds as an ISO 8601 UTC timestamp with millisecond precision.
pub fn to_iso8601(epoch: EpochSeconds) -> Result<String> {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| ToolError::InvalidTimeExpression(epoch.to_string()))
}

fn parse_absolute(expr: &str) -> Option<EpochSeconds> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(expr) {
        return Some(dt.timestamp());
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(expr, format) {
            return Some(naive.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(expr, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
}
