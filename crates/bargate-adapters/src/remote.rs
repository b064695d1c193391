use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use bargate_core::{Bar, Period, Symbol};

use crate::adapter::SourceAdapter;
use crate::client::{ApiClient, ApiRow, ClientRegistry};
use crate::error::AdapterError;
use crate::timeparse;

/// Adapter wrapping a remote [`ApiClient`] behind the canonical bar shape.
///
/// The client returns probeable rows; normalization tries the full column
/// name first, then its single-letter code. Rows that fail to normalize
/// are skipped. Transport errors propagate so the resolution loop can
/// downgrade them to "try the next source".
pub struct RemoteAdapter {
    client: Arc<dyn ApiClient>,
}

impl RemoteAdapter {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self { client }
    }

    /// Construct from a source config blob: `{api: {name, api_key?, ...}}`.
    pub fn from_config(config: &Value, clients: &ClientRegistry) -> Result<Self, AdapterError> {
        let api = config
            .get("api")
            .ok_or_else(|| AdapterError::Config("missing 'api' in restapi source config".into()))?;
        let name = api.get("name").and_then(Value::as_str).ok_or_else(|| {
            AdapterError::Config("missing 'name' in 'api' config for restapi source".into())
        })?;

        let client = clients.create(name, api)?;
        Ok(Self::new(client))
    }
}

/// Normalize one probeable row into a bar. Timestamp probes `timestamp`
/// then `t`; OHLC probe full names then single letters; volume defaults
/// to 0 when absent.
fn normalize_row(row: &ApiRow) -> Option<Bar> {
    let probe = |full: &str, short: &str| row.get(full).or_else(|| row.get(short));

    let timestamp = timeparse::parse_timestamp_value(probe("timestamp", "t")?)?;
    let open = timeparse::numeric(probe("open", "o")?)?;
    let high = timeparse::numeric(probe("high", "h")?)?;
    let low = timeparse::numeric(probe("low", "l")?)?;
    let close = timeparse::numeric(probe("close", "c")?)?;
    let volume = probe("volume", "v")
        .and_then(timeparse::numeric)
        .map(|v| v as i64)
        .unwrap_or(0);

    Some(Bar {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    })
}

#[async_trait]
impl SourceAdapter for RemoteAdapter {
    fn name(&self) -> &str {
        "restapi"
    }

    /// Remote catalogs are not enumerable through this adapter; use
    /// [`ApiClient::has_symbol`] for membership checks instead.
    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        Ok(Vec::new())
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, AdapterError> {
        let rows = self.client.fetch_symbol(symbol, start, end, period).await?;

        let mut bars: Vec<Bar> = rows
            .iter()
            .filter_map(normalize_row)
            .filter(|b| b.in_range(start, end))
            .collect();
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}
