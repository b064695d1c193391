use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use bargate_core::{Bar, Period, Symbol};

use crate::adapter::SourceAdapter;
use crate::error::AdapterError;
use crate::timeparse;

#[derive(Debug, Deserialize)]
struct FileConfig {
    path: PathBuf,
    timezone: Option<String>,
}

/// Adapter for a single flat CSV file holding one symbol's bars.
///
/// The file stem names the symbol; `fetch_bars` serves the file's rows for
/// any requested symbol, since the source represents exactly one
/// instrument. Expected header: `timestamp,open,high,low,close[,volume]`.
pub struct FileAdapter {
    path: PathBuf,
    timezone: Tz,
}

impl FileAdapter {
    pub fn new(path: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            path: path.into(),
            timezone,
        }
    }

    /// Construct from a source config blob: `{path, timezone?}`.
    pub fn from_config(config: &Value) -> Result<Self, AdapterError> {
        let config: FileConfig = serde_json::from_value(config.clone())
            .map_err(|e| AdapterError::Config(format!("invalid csv source config: {e}")))?;

        let timezone = match config.timezone.as_deref() {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| AdapterError::Config(format!("unknown timezone '{name}'")))?,
            None => chrono_tz::UTC,
        };

        Ok(Self::new(config.path, timezone))
    }

    fn symbol_code(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceAdapter for FileAdapter {
    fn name(&self) -> &str {
        "csv"
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }

        let file_name = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(vec![Symbol::bare(self.symbol_code(), file_name)])
    }

    async fn fetch_bars(
        &self,
        _symbol: &str,
        _period: Period,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, AdapterError> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| AdapterError::Parse(e.to_string()))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let (Some(ts_col), Some(open_col), Some(high_col), Some(low_col), Some(close_col)) = (
            column("timestamp"),
            column("open"),
            column("high"),
            column("low"),
            column("close"),
        ) else {
            return Err(AdapterError::Parse(format!(
                "{}: header must contain timestamp,open,high,low,close",
                self.path.display()
            )));
        };
        let volume_col = column("volume");

        let mut bars = Vec::new();
        for record in reader.records().filter_map(|r| r.ok()) {
            let Some(timestamp) = record
                .get(ts_col)
                .and_then(|raw| timeparse::parse_timestamp_tz(raw, self.timezone))
            else {
                continue;
            };

            let price = |col: usize| record.get(col).and_then(|v| v.trim().parse::<f64>().ok());
            let (Some(open), Some(high), Some(low), Some(close)) = (
                price(open_col),
                price(high_col),
                price(low_col),
                price(close_col),
            ) else {
                continue;
            };

            let volume = match volume_col.and_then(|col| record.get(col)).map(str::trim) {
                None | Some("") => 0,
                Some(raw) => match raw.parse::<i64>() {
                    Ok(v) => v,
                    Err(_) => continue,
                },
            };

            let bar = Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            };
            if bar.in_range(start, end) {
                bars.push(bar);
            }
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn list_symbols_uses_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "AAPL.csv", "timestamp,open,high,low,close\n");
        let adapter = FileAdapter::new(path, chrono_tz::UTC);

        let symbols = adapter.list_symbols().await.unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].symbol, "AAPL");
        assert_eq!(symbols[0].name, "AAPL.csv");
    }

    #[tokio::test]
    async fn missing_file_yields_empty() {
        let adapter = FileAdapter::new("/nonexistent/AAPL.csv", chrono_tz::UTC);
        assert!(adapter.list_symbols().await.unwrap().is_empty());
        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn parses_rows_and_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "AAPL.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-01-02,100,105,99,104,1000\n\
             not-a-time,1,2,3,4,5\n\
             2024-01-03,104,bad,103,105,1200\n\
             2024-01-04,104,106,103,105,\n",
        );
        let adapter = FileAdapter::new(path, chrono_tz::UTC);

        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].volume, 1000);
        // Empty volume defaults to 0.
        assert_eq!(bars[1].volume, 0);
    }

    #[tokio::test]
    async fn range_filter_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "AAPL.csv",
            "timestamp,open,high,low,close\n\
             2024-01-02,100,105,99,104\n\
             2024-01-03,104,106,103,105\n",
        );
        let adapter = FileAdapter::new(path, chrono_tz::UTC);

        let start = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, Some(start), None)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, start);
    }

    #[tokio::test]
    async fn missing_required_header_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "AAPL.csv", "time,o,h,l,c\n2024-01-02,1,2,3,4\n");
        let adapter = FileAdapter::new(path, chrono_tz::UTC);

        let result = adapter.fetch_bars("AAPL", Period::OneDay, None, None).await;
        assert!(matches!(result, Err(AdapterError::Parse(_))));
    }

    #[tokio::test]
    async fn configured_timezone_applies_to_naive_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "AAPL.csv",
            "timestamp,open,high,low,close\n2024-05-01T09:30:00,1,2,0.5,1.5\n",
        );
        let adapter = FileAdapter::from_config(&serde_json::json!({
            "path": path,
            "timezone": "America/New_York",
        }))
        .unwrap();

        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 13, 30, 0).unwrap()
        );
    }

    #[test]
    fn from_config_rejects_bad_timezone() {
        let result = FileAdapter::from_config(&serde_json::json!({
            "path": "/tmp/AAPL.csv",
            "timezone": "Mars/Olympus",
        }));
        assert!(matches!(result, Err(AdapterError::Config(_))));
    }
}
