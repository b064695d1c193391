use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use bargate_core::Period;

use crate::client::{ApiClient, ApiRow};
use crate::error::AdapterError;

const STOCKDATA_BASE_URL: &str = "https://api.stockdata.org/v1";

/// stockdata.org end-of-day client wrapping the `/data/eod` endpoint.
///
/// The provider only serves daily bars, so any requested granularity is
/// answered with its EOD series. Follows pagination links
/// (`meta.next_url`, `meta.next`, or `links.next`) until exhausted.
/// Expects an api key in config or the `STOCKDATA_API_KEY` env var.
pub struct StockDataClient {
    client: Client,
    api_token: String,
    base_url: String,
}

impl StockDataClient {
    pub fn new(api_token: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_token,
            base_url: base_url.unwrap_or_else(|| STOCKDATA_BASE_URL.to_string()),
        }
    }

    /// Construct from an `api` config blob: `{name, api_key?, base_url?}`.
    pub fn from_config(config: &Value) -> Result<Self, AdapterError> {
        let api_token = config
            .get("api_key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| std::env::var("STOCKDATA_API_KEY").ok())
            .ok_or_else(|| {
                AdapterError::Config(
                    "stockdata: api_key not set and STOCKDATA_API_KEY unset".into(),
                )
            })?;

        let base_url = config
            .get("base_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self::new(api_token, base_url))
    }

    async fn get_page(&self, url: &str, params: &[(&str, String)]) -> Result<Value, AdapterError> {
        let response = self.client.get(url).query(params).send().await?;

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

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(format!("failed to parse EOD response: {e}")))
    }
}

/// Extract one page's rows and the next pagination link, if any.
/// The `date` column is renamed to the canonical `timestamp`.
fn page_rows(page: &Value) -> (Vec<ApiRow>, Option<String>) {
    let rows = page
        .get("data")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|obj| {
                    let mut row = obj.clone();
                    if let Some(date) = row.remove("date") {
                        row.insert("timestamp".into(), date);
                    }
                    row
                })
                .collect()
        })
        .unwrap_or_default();

    let meta = page.get("meta");
    let links = page.get("links");
    let next = meta
        .and_then(|m| m.get("next_url"))
        .or_else(|| meta.and_then(|m| m.get("next")))
        .or_else(|| links.and_then(|l| l.get("next")))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    (rows, next)
}

#[async_trait]
impl ApiClient for StockDataClient {
    fn name(&self) -> &str {
        "stockdata"
    }

    async fn has_symbol(&self, symbol: &str) -> Result<bool, AdapterError> {
        let url = format!("{}/data/eod", self.base_url);
        let params = [
            ("symbols", symbol.to_string()),
            ("api_token", self.api_token.clone()),
            ("limit", "1".to_string()),
        ];
        let page = self.get_page(&url, &params).await?;
        let (rows, _) = page_rows(&page);
        Ok(!rows.is_empty())
    }

    async fn fetch_symbol(
        &self,
        symbol: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        _granularity: Period,
    ) -> Result<Vec<ApiRow>, AdapterError> {
        let mut params = vec![
            ("symbols", symbol.to_string()),
            ("api_token", self.api_token.clone()),
        ];
        if let Some(from) = from {
            params.push(("date_from", from.date_naive().to_string()));
        }
        if let Some(to) = to {
            params.push(("date_to", to.date_naive().to_string()));
        }

        let mut url = format!("{}/data/eod", self.base_url);
        let mut all_rows = Vec::new();

        loop {
            let page = self.get_page(&url, &params).await?;
            // Pagination urls carry their own params after the first page.
            params.clear();

            let (mut rows, next) = page_rows(&page);
            all_rows.append(&mut rows);

            match next {
                Some(next_url) => url = next_url,
                None => break,
            }
        }

        Ok(all_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rows_renames_date_to_timestamp() {
        let page: Value = serde_json::from_str(
            r#"{
                "data": [
                    {"date": "2024-01-02", "open": 100.0, "high": 105.0, "low": 99.0, "close": 104.0, "volume": 1000}
                ],
                "meta": {"returned": 1}
            }"#,
        )
        .unwrap();

        let (rows, next) = page_rows(&page);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("timestamp").unwrap().as_str().unwrap(),
            "2024-01-02"
        );
        assert!(!rows[0].contains_key("date"));
        assert!(next.is_none());
    }

    #[test]
    fn page_rows_follows_meta_next_url() {
        let page: Value = serde_json::from_str(
            r#"{"data": [], "meta": {"next_url": "https://api.example/page2"}}"#,
        )
        .unwrap();
        let (_, next) = page_rows(&page);
        assert_eq!(next.as_deref(), Some("https://api.example/page2"));
    }

    #[test]
    fn page_rows_follows_links_next() {
        let page: Value =
            serde_json::from_str(r#"{"data": [], "links": {"next": "https://api.example/p3"}}"#)
                .unwrap();
        let (_, next) = page_rows(&page);
        assert_eq!(next.as_deref(), Some("https://api.example/p3"));
    }

    #[test]
    fn page_rows_empty_next_is_none() {
        let page: Value =
            serde_json::from_str(r#"{"data": [], "links": {"next": ""}}"#).unwrap();
        let (_, next) = page_rows(&page);
        assert!(next.is_none());
    }

    #[test]
    fn page_rows_missing_data_is_empty() {
        let page: Value = serde_json::from_str(r#"{"meta": {}}"#).unwrap();
        let (rows, next) = page_rows(&page);
        assert!(rows.is_empty());
        assert!(next.is_none());
    }
}
