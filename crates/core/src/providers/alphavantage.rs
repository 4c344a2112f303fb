use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::CoreError;
use super::traits::PriceProvider;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage API provider for stock/equity prices.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key (set via settings as "alphavantage").
/// - **Coverage**: 100k+ global equity symbols.
///
/// Registered after Yahoo Finance, so it only serves lookups Yahoo could not.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }

    /// Extract the last `sessions` daily closes, oldest first, from a
    /// TIME_SERIES_DAILY response body.
    pub fn closes_from_json(body: &str, symbol: &str, sessions: usize) -> Result<Vec<f64>, CoreError> {
        let resp: TimeSeriesResponse = serde_json::from_str(body).map_err(|e| CoreError::Api {
            provider: "Alpha Vantage".into(),
            message: format!("Failed to parse time series for {symbol}: {e}"),
        })?;

        let series = resp.time_series.ok_or_else(|| CoreError::Api {
            provider: "Alpha Vantage".into(),
            message: format!("No time series data for {symbol}. API limit may be exceeded."),
        })?;

        let mut points: Vec<(NaiveDate, f64)> = series
            .iter()
            .filter_map(|(date_str, data)| {
                let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
                let close: f64 = data.close.parse().ok()?;
                Some((date, close))
            })
            .collect();

        if points.is_empty() {
            return Err(CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
            });
        }

        points.sort_by_key(|(date, _)| *date);
        let skip = points.len().saturating_sub(sessions.max(1));
        Ok(points.into_iter().skip(skip).map(|(_, close)| close).collect())
    }
}

/// Number of sessions implied by a range like `"5d"`; anything else means 5.
fn sessions_in_range(range: &str) -> usize {
    range
        .strip_suffix('d')
        .and_then(|n| n.parse().ok())
        .filter(|n: &usize| *n > 0)
        .unwrap_or(5)
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyData>>,
}

#[derive(Deserialize)]
struct DailyData {
    #[serde(rename = "4. close")]
    close: String,
}

#[async_trait]
impl PriceProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    async fn get_recent_closes(&self, symbol: &str, range: &str) -> Result<Vec<f64>, CoreError> {
        let body = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", &symbol.to_uppercase()),
                ("outputsize", "compact"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .text()
            .await?;

        Self::closes_from_json(&body, symbol, sessions_in_range(range))
    }
}
