use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::period::Period;

/// Descriptor of a tradable instrument as reported by an adapter's listing.
///
/// `periods` may be empty when the source does not advertise granularities;
/// it is never null. Produced lazily, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub periods: BTreeSet<Period>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Symbol {
    /// Symbol with no advertised periods or metadata.
    pub fn bare(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            periods: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_periods(mut self, periods: BTreeSet<Period>) -> Self {
        self.periods = periods;
        self
    }
}
