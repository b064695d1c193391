use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bargate_core::{Bar, Period, Symbol};

use crate::error::AdapterError;

/// Contract every data source satisfies: enumerate symbols, fetch bars.
///
/// "Not found" and "no data" are indistinguishable here: an adapter that
/// cannot resolve a file or stream for a symbol returns an empty vec,
/// never an error. Malformed rows inside a source are skipped, not
/// escalated.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter name (for logging/display).
    fn name(&self) -> &str;

    /// Enumerate the symbols this source can serve. A missing path or
    /// empty directory yields an empty vec, not an error.
    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError>;

    /// Fetch bars for a symbol at a granularity, ascending by timestamp,
    /// bounded by the inclusive `[start, end]` window (absent bound means
    /// unbounded on that side).
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, AdapterError>;
}
