use async_trait::async_trait;

use crate::errors::CoreError;

/// Trait abstraction for market-data providers.
///
/// A provider only has to return a short trailing series of daily
/// closes; the fetcher derives the current price and the previous close
/// from it. Unknown symbols and empty histories are errors, which the
/// fetcher turns into absent prices.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Trailing closes for `symbol`, oldest first, covering roughly `range`
    /// (Yahoo range syntax such as `"5d"`).
    async fn get_recent_closes(&self, symbol: &str, range: &str) -> Result<Vec<f64>, CoreError>;
}
