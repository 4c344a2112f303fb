use async_trait::async_trait;

use crate::errors::CoreError;
use super::traits::PriceProvider;

/// Yahoo Finance API provider for stock/equity prices.
///
/// - **Free**: No API key required.
/// - **No strict rate limits** (unofficial public API).
/// - **Coverage**: Global equities, ETFs, indices, mutual funds.
///
/// Uses the `yahoo_finance_api` crate which wraps Yahoo Finance's
/// public endpoints. Exchange-qualified tickers such as `RELIANCE.NS`
/// are passed through unchanged.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to create connector: {e}"),
            })?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    async fn get_recent_closes(&self, symbol: &str, range: &str) -> Result<Vec<f64>, CoreError> {
        let resp = self
            .connector
            .get_quote_range(symbol, "1d", range)
            .await
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to fetch history for {symbol}: {e}"),
            })?;

        let mut quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: "Yahoo Finance".into(),
            message: format!("No quote data for {symbol}: {e}"),
        })?;

        quotes.sort_by_key(|q| q.timestamp);
        let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();

        if closes.is_empty() {
            return Err(CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
            });
        }
        Ok(closes)
    }
}
