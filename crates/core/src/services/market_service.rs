use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::market::{IndexQuote, MarketIndex, MarketSnapshot, Region, DEFAULT_INDICES};
use crate::services::price_service::PriceService;

/// Builds market snapshots from index quotes.
///
/// Index levels go through the same [`PriceService`] as holdings, so they
/// share its cache, worker bound and timeout. An index without a level is
/// listed as unavailable rather than failing the snapshot.
pub struct MarketService {
    indices: Vec<MarketIndex>,
}

impl MarketService {
    pub fn new() -> Self {
        Self::with_indices(DEFAULT_INDICES.to_vec())
    }

    pub fn with_indices(indices: Vec<MarketIndex>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[MarketIndex] {
        &self.indices
    }

    pub async fn snapshot(&self, price_service: &PriceService) -> MarketSnapshot {
        self.snapshot_at(price_service, Utc::now()).await
    }

    /// Same as [`snapshot`](Self::snapshot) with an explicit clock for the open/closed status.
    pub async fn snapshot_at(&self, price_service: &PriceService, at: DateTime<Utc>) -> MarketSnapshot {
        let symbols: Vec<String> = self.indices.iter().map(|i| i.symbol.to_string()).collect();
        let quotes = if symbols.is_empty() {
            Default::default()
        } else {
            price_service.resolve_quotes(&symbols).await
        };

        let mut indices = Vec::with_capacity(self.indices.len());
        let mut unavailable = Vec::new();
        for index in &self.indices {
            let quote = quotes.get(&index.symbol.trim().to_uppercase()).copied().unwrap_or_default();
            match IndexQuote::from_quote(index, quote, at) {
                Some(q) => indices.push(q),
                None => unavailable.push(index.name.to_string()),
            }
        }

        let snapshot = MarketSnapshot {
            taken_at: at,
            indices,
            unavailable,
        };
        info!(
            resolved = snapshot.indices.len(),
            unavailable = snapshot.unavailable.len(),
            indian_open = snapshot.is_region_open(Region::Indian),
            global_open = snapshot.is_region_open(Region::Global),
            "Market snapshot taken"
        );
        snapshot
    }
}

impl Default for MarketService {
    fn default() -> Self {
        Self::new()
    }
}
