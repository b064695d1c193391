use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CatalogError;

fn default_enabled() -> bool {
    true
}

fn default_config() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One configured data source. The gateway never mutates these; it reads
/// `kind` to pick an adapter constructor and hands `config` to it opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    /// Registry key, e.g. "csv", "dataset", "restapi".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_config")]
    pub config: Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Ordered collection of source descriptors, loaded once at startup from a
/// JSON file. File order is the fallback order used by query resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceCatalog {
    sources: Vec<SourceDescriptor>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<SourceDescriptor>) -> Result<Self, CatalogError> {
        for source in &sources {
            if source.name.is_empty() {
                return Err(CatalogError::InvalidSource {
                    name: "<unnamed>".to_string(),
                    reason: "name must be non-empty".to_string(),
                });
            }
            if source.kind.is_empty() {
                return Err(CatalogError::InvalidSource {
                    name: source.name.clone(),
                    reason: "type must be non-empty".to_string(),
                });
            }
        }
        Ok(Self { sources })
    }

    /// Load a catalog from a JSON array of descriptors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        let sources: Vec<SourceDescriptor> = serde_json::from_str(&text)?;
        Self::new(sources)
    }

    /// Look up a source by numeric id or exact name.
    pub fn find(&self, key: &str) -> Option<&SourceDescriptor> {
        if let Ok(id) = key.parse::<i64>()
            && let Some(source) = self.sources.iter().find(|s| s.id == Some(id))
        {
            return Some(source);
        }
        self.sources.iter().find(|s| s.name == key)
    }

    /// Enabled sources in catalog order.
    pub fn enabled(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SourceCatalog {
        let json = r#"[
            {"id": 1, "name": "local", "type": "csv", "config": {"path": "/tmp/AAPL.csv"}},
            {"name": "research", "type": "dataset", "config": {"path": "/data/lean"}, "enabled": false},
            {"id": 3, "name": "polygon-live", "type": "restapi", "config": {"api": {"name": "polygon"}}}
        ]"#;
        SourceCatalog::new(serde_json::from_str(json).unwrap()).unwrap()
    }

    #[test]
    fn find_by_name() {
        let catalog = sample();
        let source = catalog.find("research").unwrap();
        assert_eq!(source.kind, "dataset");
        assert!(!source.enabled);
    }

    #[test]
    fn find_by_id() {
        let catalog = sample();
        assert_eq!(catalog.find("3").unwrap().name, "polygon-live");
    }

    #[test]
    fn numeric_name_falls_back_to_name_match() {
        let catalog = SourceCatalog::new(vec![SourceDescriptor {
            id: None,
            name: "42".to_string(),
            kind: "csv".to_string(),
            config: default_config(),
            enabled: true,
        }])
        .unwrap();
        assert!(catalog.find("42").is_some());
    }

    #[test]
    fn find_missing() {
        assert!(sample().find("nope").is_none());
    }

    #[test]
    fn enabled_preserves_order_and_skips_disabled() {
        let catalog = sample();
        let names: Vec<&str> = catalog.enabled().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["local", "polygon-live"]);
    }

    #[test]
    fn enabled_and_config_default() {
        let source: SourceDescriptor =
            serde_json::from_str(r#"{"name": "x", "type": "csv"}"#).unwrap();
        assert!(source.enabled);
        assert!(source.config.is_object());
    }

    #[test]
    fn empty_kind_rejected() {
        let result = SourceCatalog::new(vec![SourceDescriptor {
            id: None,
            name: "bad".to_string(),
            kind: String::new(),
            config: default_config(),
            enabled: true,
        }]);
        assert!(result.is_err());
    }
}
