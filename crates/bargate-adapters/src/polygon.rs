use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use bargate_core::Period;

use crate::client::{ApiClient, ApiRow};
use crate::error::AdapterError;

const POLYGON_BASE_URL: &str = "https://api.polygon.io";

/// Polygon.io aggregates client: a minimal fetcher for the
/// `/v2/aggs/ticker/{symbol}/range` endpoint.
/// Expects an api key in config or the `POLYGON_API_KEY` env var.
pub struct PolygonClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PolygonClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| POLYGON_BASE_URL.to_string()),
        }
    }

    /// Construct from an `api` config blob: `{name, api_key?, base_url?}`.
    pub fn from_config(config: &Value) -> Result<Self, AdapterError> {
        let api_key = config
            .get("api_key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| std::env::var("POLYGON_API_KEY").ok())
            .ok_or_else(|| {
                AdapterError::Config("polygon: api_key not set and POLYGON_API_KEY unset".into())
            })?;

        let base_url = config
            .get("base_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self::new(api_key, base_url))
    }
}

/// Multiplier and timespan for Polygon's range path.
fn range_parts(period: Period) -> (u32, &'static str) {
    match period {
        Period::OneMinute => (1, "minute"),
        Period::FiveMinutes => (5, "minute"),
        Period::OneHour => (1, "hour"),
        Period::OneDay => (1, "day"),
    }
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggBar>,
}

#[derive(Debug, Deserialize)]
struct AggBar {
    /// Window start, epoch milliseconds.
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
}

impl AggBar {
    /// Probeable row with canonical column names; `t` becomes an RFC 3339
    /// `timestamp`. Bars with an unrepresentable window start are dropped.
    fn to_row(&self) -> Option<ApiRow> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.t)?;

        let mut row = ApiRow::new();
        row.insert("timestamp".into(), Value::from(timestamp.to_rfc3339()));
        row.insert("open".into(), Value::from(self.o));
        row.insert("high".into(), Value::from(self.h));
        row.insert("low".into(), Value::from(self.l));
        row.insert("close".into(), Value::from(self.c));
        row.insert("volume".into(), Value::from(self.v));
        Some(row)
    }
}

#[async_trait]
impl ApiClient for PolygonClient {
    fn name(&self) -> &str {
        "polygon"
    }

    async fn has_symbol(&self, symbol: &str) -> Result<bool, AdapterError> {
        let response = self
            .client
            .get(format!("{}/v3/reference/tickers/{symbol}", self.base_url))
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                status,
                message: body,
            });
        }
        Ok(true)
    }

    async fn fetch_symbol(
        &self,
        symbol: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        granularity: Period,
    ) -> Result<Vec<ApiRow>, AdapterError> {
        let from = from
            .map(|d| d.date_naive())
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default());
        let to = to
            .map(|d| d.date_naive())
            .unwrap_or_else(|| Utc::now().date_naive());
        let (multiplier, timespan) = range_parts(granularity);

        let response = self
            .client
            .get(format!(
                "{}/v2/aggs/ticker/{symbol}/range/{multiplier}/{timespan}/{from}/{to}",
                self.base_url
            ))
            .query(&[
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
                ("apiKey", &self.api_key),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(AdapterError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Api {
                status,
                message: body,
            });
        }

        let body: AggsResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(format!("failed to parse aggregates: {e}")))?;

        Ok(body.results.iter().filter_map(AggBar::to_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_parts_mapping() {
        assert_eq!(range_parts(Period::OneMinute), (1, "minute"));
        assert_eq!(range_parts(Period::FiveMinutes), (5, "minute"));
        assert_eq!(range_parts(Period::OneHour), (1, "hour"));
        assert_eq!(range_parts(Period::OneDay), (1, "day"));
    }

    #[test]
    fn parse_aggs_response_json() {
        let json = r#"{
            "ticker": "AAPL",
            "resultsCount": 2,
            "results": [
                {"t": 1704205800000, "o": 100.0, "h": 105.0, "l": 99.0, "c": 104.0, "v": 1000.0},
                {"t": 1704292200000, "o": 104.0, "h": 106.0, "l": 103.0, "c": 105.0, "v": 1200.0}
            ]
        }"#;

        let response: AggsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].o, 100.0);
        assert_eq!(response.results[1].v, 1200.0);
    }

    #[test]
    fn parse_aggs_response_without_results() {
        let json = r#"{"ticker": "AAPL", "resultsCount": 0}"#;
        let response: AggsResponse = serde_json::from_str(json).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn agg_bar_to_row_converts_millis() {
        let bar = AggBar {
            t: 1704205800000,
            o: 100.0,
            h: 105.0,
            l: 99.0,
            c: 104.0,
            v: 1000.0,
        };

        let row = bar.to_row().unwrap();
        assert_eq!(
            row.get("timestamp").unwrap().as_str().unwrap(),
            "2024-01-02T14:30:00+00:00"
        );
        assert_eq!(row.get("open").unwrap().as_f64().unwrap(), 100.0);
        assert_eq!(row.get("volume").unwrap().as_f64().unwrap(), 1000.0);
    }

    #[test]
    fn from_config_reads_key() {
        let client = PolygonClient::from_config(&serde_json::json!({
            "name": "polygon",
            "api_key": "test-key",
            "base_url": "http://localhost:9999"
        }))
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.api_key, "test-key");
    }
}
