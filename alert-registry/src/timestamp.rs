use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

// Epoch values above this are taken as milliseconds (year 2286 in seconds).
const EPOCH_MILLIS_THRESHOLD: u64 = 10_000_000_000;

pub fn now_rfc3339() -> String {
    format_utc(Utc::now())
}

fn format_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parses RFC 3339, naive ISO-8601 (taken as UTC) and epoch seconds or
/// milliseconds, given as a JSON string or number.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_str(s),
        Value::Number(n) => match n.as_i64() {
            Some(value) => from_epoch(value),
            None => n.as_f64().and_then(from_epoch_float),
        },
        _ => None,
    }
}

fn parse_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    raw.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
        from_epoch_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

fn from_epoch_float(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= EPOCH_MILLIS_THRESHOLD as f64 {
        value
    } else {
        value * 1000.0
    };
    // Out-of-range floats saturate on the cast and are rejected below.
    from_epoch_millis(millis as i64)
}

fn from_epoch_millis(value: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
}

/// Normalized `lastReceived` value. Anything missing or unparseable becomes
/// the current time.
pub fn normalize_timestamp(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => now_rfc3339(),
        Some(value) => match parse_timestamp(value) {
            Some(ts) => format_utc(ts),
            None => {
                tracing::debug!(%value, "unparseable timestamp, substituting now");
                now_rfc3339()
            }
        },
    }
}
