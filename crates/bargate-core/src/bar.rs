use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar, the canonical record every adapter emits.
///
/// Prices are plain f64 and volume an i64 (0 when the source reports none).
/// Price sanity (`low <= open,close <= high`) is not enforced; only
/// structural completeness is, at parse time in the adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: i64,
}

impl Bar {
    /// True when the timestamp falls inside the inclusive `[start, end]`
    /// window. An absent bound is unbounded on that side.
    pub fn in_range(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
        if let Some(start) = start
            && self.timestamp < start
        {
            return false;
        }
        if let Some(end) = end
            && self.timestamp > end
        {
            return false;
        }
        true
    }
}
