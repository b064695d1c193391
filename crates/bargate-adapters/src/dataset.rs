use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use bargate_core::{Bar, Period, Symbol};

use crate::adapter::SourceAdapter;
use crate::error::AdapterError;
use crate::timeparse;

/// Container format of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Jsonl,
}

/// Default probe order per canonical field. CSV files usually carry full
/// column names; JSON-lines research dumps favor single-letter codes.
fn default_names(format: DataFormat, canonical: &str) -> &'static [&'static str] {
    match (format, canonical) {
        (DataFormat::Csv, "timestamp") => &["timestamp", "time"],
        (DataFormat::Csv, "open") => &["open"],
        (DataFormat::Csv, "high") => &["high"],
        (DataFormat::Csv, "low") => &["low"],
        (DataFormat::Csv, "close") => &["close"],
        (DataFormat::Csv, "volume") => &["volume"],
        (DataFormat::Jsonl, "timestamp") => &["t", "time", "timestamp"],
        (DataFormat::Jsonl, "open") => &["o", "open"],
        (DataFormat::Jsonl, "high") => &["h", "high"],
        (DataFormat::Jsonl, "low") => &["l", "low"],
        (DataFormat::Jsonl, "close") => &["c", "close"],
        (DataFormat::Jsonl, "volume") => &["v", "volume"],
        _ => &[],
    }
}

#[derive(Debug, Deserialize)]
struct DatasetConfig {
    path: PathBuf,
    format: Option<DataFormat>,
    #[serde(default)]
    field_map: BTreeMap<String, String>,
    periods: Option<BTreeSet<Period>>,
}

/// Adapter for local research datasets: a single file or a directory of
/// symbol-named files, in CSV or JSON-lines form, optionally gzipped.
///
/// Filename convention: `{SYMBOL}_{PERIOD}.{ext}` or `{SYMBOL}.{ext}`.
/// Strictly local; never touches the network.
pub struct DatasetAdapter {
    path: PathBuf,
    format: Option<DataFormat>,
    field_map: BTreeMap<String, String>,
    periods: BTreeSet<Period>,
}

impl DatasetAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
            field_map: BTreeMap::new(),
            periods: Period::default_set(),
        }
    }

    /// Construct from a source config blob:
    /// `{path, format?, field_map?, periods?}`.
    pub fn from_config(config: &Value) -> Result<Self, AdapterError> {
        let config: DatasetConfig = serde_json::from_value(config.clone())
            .map_err(|e| AdapterError::Config(format!("invalid dataset source config: {e}")))?;

        Ok(Self {
            path: config.path,
            format: config.format,
            field_map: config.field_map,
            periods: config.periods.unwrap_or_else(Period::default_set),
        })
    }

    pub fn with_field_map(mut self, field_map: BTreeMap<String, String>) -> Self {
        self.field_map = field_map;
        self
    }

    /// Names to probe for a canonical field: the configured alias first,
    /// then the per-format defaults.
    fn probe_names<'a>(&'a self, format: DataFormat, canonical: &'static str) -> Vec<&'a str> {
        let mut names: Vec<&str> = Vec::new();
        if let Some(mapped) = self.field_map.get(canonical) {
            names.push(mapped.as_str());
        }
        names.extend(default_names(format, canonical));
        names
    }

    /// Locate the file serving `symbol` at `period`. Exact candidates are
    /// tried first, then a case-insensitive prefix scan in sorted order.
    /// No match means no data, not an error.
    fn find_file(&self, symbol: &str, period: Period) -> Option<PathBuf> {
        if self.path.is_file() {
            let stem = self.path.file_stem()?.to_string_lossy();
            return stem.starts_with(symbol).then(|| self.path.clone());
        }
        if !self.path.is_dir() {
            return None;
        }

        let candidates = [
            format!("{symbol}_{period}.csv"),
            format!("{symbol}_{period}.jsonl"),
            format!("{symbol}.csv"),
            format!("{symbol}.jsonl"),
        ];
        for name in &candidates {
            let candidate = self.path.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        let prefix = symbol.to_lowercase();
        sorted_entries(&self.path)
            .into_iter()
            .find(|p| match p.file_stem() {
                Some(stem) => stem.to_string_lossy().to_lowercase().starts_with(&prefix),
                None => false,
            })
    }

    /// Container format for a path: explicit config wins, then the file
    /// extension (inner extension when the outer one is `.gz`).
    fn detect_format(&self, path: &Path) -> DataFormat {
        if let Some(format) = self.format {
            return format;
        }

        let ext = extension(path);
        if ext.eq_ignore_ascii_case("gz") {
            let inner = path
                .file_stem()
                .map(|stem| extension(Path::new(stem)))
                .unwrap_or_default();
            if inner.eq_ignore_ascii_case("jsonl") {
                return DataFormat::Jsonl;
            }
            return DataFormat::Csv;
        }
        if ext.eq_ignore_ascii_case("jsonl") {
            DataFormat::Jsonl
        } else {
            DataFormat::Csv
        }
    }

    fn read_csv(
        &self,
        reader: Box<dyn BufRead>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<Bar> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let Ok(headers) = csv_reader.headers().cloned() else {
            return Vec::new();
        };

        let column = |canonical: &'static str| {
            self.probe_names(DataFormat::Csv, canonical)
                .into_iter()
                .find_map(|name| headers.iter().position(|h| h == name))
        };

        let (Some(ts_col), Some(open_col), Some(high_col), Some(low_col), Some(close_col)) = (
            column("timestamp"),
            column("open"),
            column("high"),
            column("low"),
            column("close"),
        ) else {
            debug!(path = %self.path.display(), "required columns missing, yielding nothing");
            return Vec::new();
        };
        let volume_col = column("volume");

        let mut bars = Vec::new();
        for record in csv_reader.records().filter_map(|r| r.ok()) {
            let Some(timestamp) = record.get(ts_col).and_then(timeparse::parse_timestamp) else {
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
        bars
    }

    fn read_jsonl(
        &self,
        reader: Box<dyn BufRead>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<Bar> {
        let mut bars = Vec::new();
        for line in reader.lines().filter_map(|l| l.ok()) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line) else {
                continue;
            };

            let field = |canonical: &'static str| {
                self.probe_names(DataFormat::Jsonl, canonical)
                    .into_iter()
                    .find_map(|name| obj.get(name))
            };

            let Some(timestamp) = field("timestamp").and_then(timeparse::parse_timestamp_value)
            else {
                continue;
            };

            let price = |canonical: &'static str| field(canonical).and_then(timeparse::numeric);
            let (Some(open), Some(high), Some(low), Some(close)) = (
                price("open"),
                price("high"),
                price("low"),
                price("close"),
            ) else {
                continue;
            };

            let volume = match field("volume") {
                None | Some(Value::Null) => 0,
                Some(value) => match timeparse::numeric(value) {
                    Some(v) => v as i64,
                    None => continue,
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
        bars
    }
}

#[async_trait]
impl SourceAdapter for DatasetAdapter {
    fn name(&self) -> &str {
        "dataset"
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, AdapterError> {
        if self.path.is_file() {
            let stem = self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(vec![
                Symbol::bare(stem.clone(), stem).with_periods(self.periods.clone()),
            ]);
        }
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }

        let mut codes = BTreeSet::new();
        for path in sorted_entries(&self.path) {
            let ext = extension(&path);
            if !(ext.eq_ignore_ascii_case("csv")
                || ext.eq_ignore_ascii_case("jsonl")
                || ext.eq_ignore_ascii_case("gz"))
            {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                let stem = stem.to_string_lossy();
                let code = stem.split('_').next().unwrap_or(&stem).to_string();
                if !code.is_empty() {
                    codes.insert(code);
                }
            }
        }

        Ok(codes
            .into_iter()
            .map(|code| Symbol::bare(code.clone(), code).with_periods(self.periods.clone()))
            .collect())
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, AdapterError> {
        let Some(path) = self.find_file(symbol, period) else {
            return Ok(Vec::new());
        };

        let reader = open_reader(&path)?;
        let mut bars = match self.detect_format(&path) {
            DataFormat::Csv => self.read_csv(reader, start, end),
            DataFormat::Jsonl => self.read_jsonl(reader, start, end),
        };
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|iter| {
            iter.filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    entries.sort();
    entries
}

fn open_reader(path: &Path) -> Result<Box<dyn BufRead>, AdapterError> {
    let file = std::fs::File::open(path)?;
    if extension(path).eq_ignore_ascii_case("gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn write_gzip(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    const AAPL_DAILY: &str = "timestamp,open,high,low,close,volume\n\
                              2024-01-02,100,105,99,104,1000\n\
                              2024-01-03,104,106,103,105,1200\n";

    #[tokio::test]
    async fn dataset_directory_daily_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "AAPL_1d.csv", AAPL_DAILY);

        let adapter = DatasetAdapter::new(dir.path());
        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].volume, 1000);
        assert_eq!(bars[1].close, 105.0);
        assert!(bars[0].timestamp < bars[1].timestamp);
    }

    #[tokio::test]
    async fn start_bound_excludes_earlier_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "AAPL_1d.csv", AAPL_DAILY);

        let adapter = DatasetAdapter::new(dir.path());
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, Some(start), None)
            .await
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 1200);
    }

    #[tokio::test]
    async fn gzipped_jsonl_single_letter_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_gzip(
            dir.path(),
            "MSFT_1m.jsonl.gz",
            "{\"t\":\"2024-05-01T09:30:00\",\"o\":1,\"h\":2,\"l\":0.5,\"c\":1.5,\"v\":10}\n",
        );

        let adapter = DatasetAdapter::new(dir.path());
        let bars = adapter
            .fetch_bars("MSFT", Period::OneMinute, None, None)
            .await
            .unwrap();

        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(
            bar.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
        );
        assert_eq!(bar.open, 1.0);
        assert_eq!(bar.high, 2.0);
        assert_eq!(bar.low, 0.5);
        assert_eq!(bar.close, 1.5);
        assert_eq!(bar.volume, 10);
    }

    #[tokio::test]
    async fn unknown_symbol_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "AAPL_1d.csv", AAPL_DAILY);

        let adapter = DatasetAdapter::new(dir.path());
        let bars = adapter
            .fetch_bars("TSLA", Period::OneDay, None, None)
            .await
            .unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let adapter = DatasetAdapter::new("/nonexistent/dataset");
        assert!(adapter.list_symbols().await.unwrap().is_empty());
        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn case_insensitive_prefix_scan_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_gzip(dir.path(), "MSFT_1m.jsonl.gz", "{\"t\":1714555800,\"o\":1,\"h\":2,\"l\":0.5,\"c\":1.5,\"v\":3}\n");

        let adapter = DatasetAdapter::new(dir.path());
        // Not in the exact candidate list; found by the prefix scan.
        let bars = adapter
            .fetch_bars("msft", Period::OneDay, None, None)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 3);
    }

    #[tokio::test]
    async fn field_map_aliases_csv_columns() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "NVDA.csv",
            "dt,o,h,l,c,vol\n2024-01-02T10:00:00,10,12,9,11,500\n",
        );

        let field_map: BTreeMap<String, String> = [
            ("timestamp", "dt"),
            ("open", "o"),
            ("high", "h"),
            ("low", "l"),
            ("close", "c"),
            ("volume", "vol"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let adapter = DatasetAdapter::new(dir.path()).with_field_map(field_map);
        let bars = adapter
            .fetch_bars("NVDA", Period::OneDay, None, None)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 11.0);
        assert_eq!(bars[0].volume, 500);
    }

    #[tokio::test]
    async fn malformed_jsonl_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "AAPL.jsonl",
            "{\"t\":\"2024-01-02\",\"o\":1,\"h\":2,\"l\":0.5,\"c\":1.5}\n\
             not json at all\n\
             {\"t\":\"garbage-time\",\"o\":1,\"h\":2,\"l\":0.5,\"c\":1.5}\n\
             {\"t\":\"2024-01-03\",\"o\":1,\"h\":2,\"l\":0.5}\n\
             \n",
        );

        let adapter = DatasetAdapter::new(dir.path());
        let bars = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();
        // Only the first object parses; volume absent defaults to 0.
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 0);
    }

    #[tokio::test]
    async fn single_file_requires_symbol_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "AAPL_1d.csv", AAPL_DAILY);

        let adapter = DatasetAdapter::new(path);
        let hit = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();
        assert_eq!(hit.len(), 2);

        // Single-file match is case-sensitive.
        let miss = adapter
            .fetch_bars("aapl", Period::OneDay, None, None)
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn exact_period_candidate_beats_prefix_scan() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "AAPL_1d.csv", AAPL_DAILY);
        write_file(
            dir.path(),
            "AAPL_1m.csv",
            "timestamp,open,high,low,close\n2024-01-02T09:30:00,1,2,0.5,1.5\n",
        );

        let adapter = DatasetAdapter::new(dir.path());
        let daily = adapter
            .fetch_bars("AAPL", Period::OneDay, None, None)
            .await
            .unwrap();
        assert_eq!(daily.len(), 2);

        let minute = adapter
            .fetch_bars("AAPL", Period::OneMinute, None, None)
            .await
            .unwrap();
        assert_eq!(minute.len(), 1);
    }

    #[tokio::test]
    async fn list_symbols_dedupes_and_strips_periods() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "AAPL_1d.csv", AAPL_DAILY);
        write_file(dir.path(), "AAPL_1m.csv", "timestamp,open,high,low,close\n");
        write_gzip(dir.path(), "MSFT_1m.jsonl.gz", "");
        write_file(dir.path(), "notes.txt", "ignored");

        let adapter = DatasetAdapter::new(dir.path());
        let symbols = adapter.list_symbols().await.unwrap();
        let codes: Vec<&str> = symbols.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(codes, vec!["AAPL", "MSFT"]);
        assert_eq!(symbols[0].periods, Period::default_set());
    }

    #[test]
    fn format_detection_inner_extension() {
        let adapter = DatasetAdapter::new("/tmp/data");
        assert_eq!(
            adapter.detect_format(Path::new("a/AAPL_1m.jsonl.gz")),
            DataFormat::Jsonl
        );
        assert_eq!(
            adapter.detect_format(Path::new("a/AAPL_1d.csv.gz")),
            DataFormat::Csv
        );
        assert_eq!(
            adapter.detect_format(Path::new("a/AAPL.jsonl")),
            DataFormat::Jsonl
        );
        assert_eq!(adapter.detect_format(Path::new("a/AAPL.csv")), DataFormat::Csv);
    }

    #[test]
    fn from_config_parses_periods_and_format() {
        let adapter = DatasetAdapter::from_config(&serde_json::json!({
            "path": "/data/lean",
            "format": "jsonl",
            "periods": ["1m", "1d"],
            "field_map": {"timestamp": "ts"},
        }))
        .unwrap();
        assert_eq!(adapter.format, Some(DataFormat::Jsonl));
        assert_eq!(adapter.periods.len(), 2);
        assert_eq!(adapter.field_map.get("timestamp").unwrap(), "ts");
    }
}
