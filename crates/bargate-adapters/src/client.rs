use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use bargate_core::Period;

use crate::error::AdapterError;

/// One row from a remote provider: a JSON object with probeable column
/// names. The remote adapter normalizes these into canonical bars.
pub type ApiRow = Map<String, Value>;

/// Contract for a remote market-data API consumed by the remote adapter.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Client name (for logging/display).
    fn name(&self) -> &str;

    /// True if the symbol is known to this provider.
    async fn has_symbol(&self, symbol: &str) -> Result<bool, AdapterError>;

    /// Fetch rows for a symbol in the inclusive `[from, to]` window at the
    /// requested granularity. An empty result is not an error.
    async fn fetch_symbol(
        &self,
        symbol: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        granularity: Period,
    ) -> Result<Vec<ApiRow>, AdapterError>;
}

type ClientCtor = Box<dyn Fn(&Value) -> Result<Arc<dyn ApiClient>, AdapterError> + Send + Sync>;

/// Maps an API name (from a restapi source's `api.name` config) to a client
/// constructor. Populated once at startup; registration is one-shot.
#[derive(Default)]
pub struct ClientRegistry {
    ctors: BTreeMap<String, ClientCtor>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in clients: `polygon`, `stockdata`.
    pub fn with_builtins() -> Self {
        let mut ctors: BTreeMap<String, ClientCtor> = BTreeMap::new();
        ctors.insert(
            "polygon".to_string(),
            Box::new(|cfg| {
                crate::polygon::PolygonClient::from_config(cfg)
                    .map(|c| Arc::new(c) as Arc<dyn ApiClient>)
            }),
        );
        ctors.insert(
            "stockdata".to_string(),
            Box::new(|cfg| {
                crate::stockdata::StockDataClient::from_config(cfg)
                    .map(|c| Arc::new(c) as Arc<dyn ApiClient>)
            }),
        );
        Self { ctors }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        ctor: ClientCtor,
    ) -> Result<(), AdapterError> {
        let name = name.into();
        if self.ctors.contains_key(&name) {
            return Err(AdapterError::Config(format!(
                "API client already registered for '{name}'"
            )));
        }
        self.ctors.insert(name, ctor);
        Ok(())
    }

    /// Construct a client for a registered name from its config blob.
    pub fn create(&self, name: &str, config: &Value) -> Result<Arc<dyn ApiClient>, AdapterError> {
        let ctor = self
            .ctors
            .get(name)
            .ok_or_else(|| AdapterError::Config(format!("no API client registered for '{name}'")))?;
        ctor(config)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }
}
