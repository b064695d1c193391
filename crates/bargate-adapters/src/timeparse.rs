//! Timestamp normalization shared by the file-backed adapters and the
//! remote-row shim. Sources disagree wildly on how they spell an instant:
//! RFC 3339, naive date-times, bare dates, or numeric epoch seconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Parse a timestamp string, trying ISO-8601 forms first and numeric epoch
/// seconds as a last resort. Naive values are interpreted in `tz`.
/// Returns `None` when nothing matches; callers skip the row.
pub fn parse_timestamp_tz(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    if let Some(naive) = naive {
        // Ambiguous local times (DST folds) resolve to the earlier instant.
        return tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
    }

    epoch_seconds(raw.parse::<f64>().ok()?)
}

/// [`parse_timestamp_tz`] with naive values taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_timestamp_tz(raw, chrono_tz::UTC)
}

/// Normalize a JSON value holding a timestamp: strings go through the
/// string parser, numbers are epoch seconds.
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => epoch_seconds(n.as_f64()?),
        _ => None,
    }
}

/// Coerce a JSON value into a number: numbers pass through, numeric
/// strings are parsed. Used for OHLCV fields in JSON-shaped sources.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract().abs() * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}
