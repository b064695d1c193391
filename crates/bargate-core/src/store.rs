use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::bar::Bar;
use crate::error::StoreError;
use crate::schema;

/// Maximum rows a single range scan returns. Mirrors the query cap the
/// gateway applies before falling back to live sources.
pub const MAX_SCAN_ROWS: usize = 10_000;

/// Filesystem-backed store for OHLC bars in Parquet format.
///
/// Directory layout: `{root}/data/{source}/{SYMBOL}.parquet`
pub struct BarStore {
    data_dir: PathBuf,
}

impl BarStore {
    /// Create a store rooted at the given directory.
    /// The `data/` subdirectory is used automatically.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            data_dir: root.as_ref().join("data"),
        }
    }

    /// Path to the Parquet file for a given source and symbol.
    pub fn file_path(&self, source: &str, symbol: &str) -> PathBuf {
        self.data_dir.join(source).join(format!("{symbol}.parquet"))
    }

    /// Check if any bars are persisted for a symbol under a source.
    pub fn has_data(&self, source: &str, symbol: &str) -> bool {
        self.file_path(source, symbol).exists()
    }

    /// Write bars for a (source, symbol) pair, sorted by timestamp.
    /// Creates parent directories as needed. Overwrites an existing file.
    pub fn write_bars(&self, source: &str, symbol: &str, bars: &[Bar]) -> Result<(), StoreError> {
        let path = self.file_path(source, symbol);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut sorted = bars.to_vec();
        sorted.sort_by_key(|b| b.timestamp);
        schema::write_parquet(&path, &sorted)
    }

    /// Scan persisted bars for a (source, symbol) pair within an inclusive
    /// `[start, end]` window, ascending by timestamp, capped at
    /// [`MAX_SCAN_ROWS`]. A missing file yields an empty vec, not an error.
    pub fn range_scan(
        &self,
        source: &str,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, StoreError> {
        let path = self.file_path(source, symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut bars = schema::read_parquet(&path)?;
        bars.retain(|b| b.in_range(start, end));
        bars.sort_by_key(|b| b.timestamp);
        bars.truncate(MAX_SCAN_ROWS);
        Ok(bars)
    }

    /// List all symbols persisted under a source, sorted.
    pub fn list_symbols(&self, source: &str) -> Result<Vec<String>, StoreError> {
        let source_dir = self.data_dir.join(source);
        if !source_dir.exists() {
            return Ok(Vec::new());
        }

        let mut symbols = Vec::new();
        for entry in std::fs::read_dir(&source_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
                && let Some(symbol) = name.strip_suffix(".parquet")
            {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    /// List all sources that have persisted data, sorted.
    pub fn list_sources(&self) -> Result<Vec<String>, StoreError> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                sources.push(name.to_string());
            }
        }
        sources.sort();
        Ok(sources)
    }
}
