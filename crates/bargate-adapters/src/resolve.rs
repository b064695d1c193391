use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use bargate_core::{Bar, BarStore, Period, SourceCatalog, SourceDescriptor, StoreError};

use crate::error::RegistryError;
use crate::registry::AdapterRegistry;

/// One bar query: which symbol, over what window, at what granularity,
/// and optionally pinned to a single configured source (by name or id).
#[derive(Debug, Clone)]
pub struct BarQuery {
    pub symbol: String,
    pub source: Option<String>,
    pub period: Period,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl BarQuery {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            source: None,
            period: Period::OneDay,
            start: None,
            end: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    /// Required query input absent; a client error at the boundary.
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// The named source does not exist in the catalog.
    #[error("data source '{0}' not found")]
    SourceNotFound(String),

    /// Misconfigured gateway: unknown source type or a constructor
    /// failure. Distinct from a source that merely has nothing to say.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Every consulted source, stored and live, came back empty.
    #[error("no data found for '{symbol}'")]
    NoDataFound { symbol: String },
}

/// A successful resolution: the winning source and its bars.
#[derive(Debug)]
pub struct Resolution {
    pub source: String,
    /// True when the bars came from the persisted store rather than a
    /// live adapter fetch.
    pub from_store: bool,
    pub bars: Vec<Bar>,
}

/// Resolves bar queries against the persisted store first, then the
/// configured sources' adapters in catalog order.
///
/// Registry, store, and catalog are all populated at startup and only read
/// here, so concurrent resolutions need no synchronization; every call
/// constructs its own adapters.
pub struct QueryResolver<'a> {
    registry: &'a AdapterRegistry,
    store: &'a BarStore,
    catalog: &'a SourceCatalog,
}

impl<'a> QueryResolver<'a> {
    pub fn new(
        registry: &'a AdapterRegistry,
        store: &'a BarStore,
        catalog: &'a SourceCatalog,
    ) -> Self {
        Self {
            registry,
            store,
            catalog,
        }
    }

    /// Resolve a query to a bar sequence.
    ///
    /// Candidates are the named source, or every enabled source in catalog
    /// order when none is named. Stored bars always win over a live fetch.
    /// A live adapter that fails is logged and skipped; the first source
    /// producing a non-empty sequence wins outright, with no merging.
    pub async fn resolve(&self, query: &BarQuery) -> Result<Resolution, QueryError> {
        if query.symbol.trim().is_empty() {
            return Err(QueryError::MissingParameter("symbol"));
        }

        let candidates: Vec<&SourceDescriptor> = match &query.source {
            Some(key) => vec![
                self.catalog
                    .find(key)
                    .ok_or_else(|| QueryError::SourceNotFound(key.clone()))?,
            ],
            None => self.catalog.enabled().collect(),
        };

        for descriptor in &candidates {
            let bars =
                self.store
                    .range_scan(&descriptor.name, &query.symbol, query.start, query.end)?;
            if !bars.is_empty() {
                debug!(
                    source = %descriptor.name,
                    rows = bars.len(),
                    "serving stored bars"
                );
                return Ok(Resolution {
                    source: descriptor.name.clone(),
                    from_store: true,
                    bars,
                });
            }
        }

        // Adapters are only constructed once storage comes up empty. An
        // unregistered source type or broken config still fails the query
        // loudly here, unlike a live-fetch failure.
        for descriptor in &candidates {
            let adapter = self.registry.resolve(descriptor)?;
            match adapter
                .fetch_bars(&query.symbol, query.period, query.start, query.end)
                .await
            {
                Ok(bars) if !bars.is_empty() => {
                    debug!(
                        source = %descriptor.name,
                        rows = bars.len(),
                        "serving live bars"
                    );
                    return Ok(Resolution {
                        source: descriptor.name.clone(),
                        from_store: false,
                        bars,
                    });
                }
                Ok(_) => {
                    debug!(source = %descriptor.name, symbol = %query.symbol, "source has no data");
                }
                Err(error) => {
                    warn!(
                        source = %descriptor.name,
                        %error,
                        "adapter fetch failed, trying next source"
                    );
                }
            }
        }

        Err(QueryError::NoDataFound {
            symbol: query.symbol.clone(),
        })
    }
}
