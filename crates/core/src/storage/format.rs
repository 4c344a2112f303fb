use std::collections::BTreeMap;

use chrono::Duration;

use crate::errors::CoreError;
use crate::models::holding::{normalize_ticker, Holding};
use crate::models::portfolio::{Portfolio, PortfolioBook};
use crate::models::price::{CacheEntry, PriceCache, PriceKey};

/// Portfolio file layout: portfolio name → ordered holding records.
///
/// ```text
/// {
///   "Long Term": [
///     { "Stock Name": "Infosys", "Ticker Symbol": "INFY.NS", "Quantity": 10.0, ... }
///   ]
/// }
/// ```
pub type PortfolioFile = BTreeMap<String, Vec<Holding>>;

/// Cache file layout: storage key (`AAPL`, `AAPL_prev`) → entry.
pub type CacheFile = BTreeMap<String, CacheEntry>;

pub fn encode_portfolios(book: &PortfolioBook) -> Result<String, CoreError> {
    let file: PortfolioFile = book
        .iter()
        .map(|p| (p.name.clone(), p.holdings().to_vec()))
        .collect();
    serde_json::to_string_pretty(&file)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize portfolios: {e}")))
}

/// Parse and validate a portfolio file.
///
/// Rejects the whole file on duplicate portfolio names, duplicate tickers
/// within a portfolio, empty tickers, or non-finite/negative quantities
/// and non-positive purchase prices. Investment values are recomputed
/// rather than trusted.
pub fn decode_portfolios(json: &str) -> Result<PortfolioBook, CoreError> {
    let file: PortfolioFile = serde_json::from_str(json)?;
    let mut book = PortfolioBook::new();

    for (name, holdings) in file {
        let mut portfolio = Portfolio::new(name.trim());
        for (row, mut holding) in holdings.into_iter().enumerate() {
            validate_record(&portfolio.name, row, &holding)?;
            holding.ticker = normalize_ticker(&holding.ticker);
            holding.recompute_investment();
            portfolio.push(holding).map_err(|e| {
                CoreError::InvalidFileFormat(format!("Portfolio '{name}': {e}"))
            })?;
        }
        book.insert(portfolio)
            .map_err(|e| CoreError::InvalidFileFormat(e.to_string()))?;
    }

    Ok(book)
}

fn validate_record(portfolio: &str, row: usize, holding: &Holding) -> Result<(), CoreError> {
    if holding.ticker.trim().is_empty() {
        return Err(CoreError::InvalidFileFormat(format!(
            "Portfolio '{portfolio}', row {row}: empty ticker symbol"
        )));
    }
    if !holding.quantity.is_finite() || holding.quantity < 0.0 {
        return Err(CoreError::InvalidFileFormat(format!(
            "Portfolio '{portfolio}', row {row}: invalid quantity {}",
            holding.quantity
        )));
    }
    if !holding.purchase_price.is_finite() || holding.purchase_price <= 0.0 {
        return Err(CoreError::InvalidFileFormat(format!(
            "Portfolio '{portfolio}', row {row}: invalid purchase price {}",
            holding.purchase_price
        )));
    }
    if !(holding.quantity * holding.purchase_price).is_finite() {
        return Err(CoreError::InvalidFileFormat(format!(
            "Portfolio '{portfolio}', row {row}: investment value out of range"
        )));
    }
    Ok(())
}

pub fn encode_cache(cache: &PriceCache) -> Result<String, CoreError> {
    let file: CacheFile = cache
        .entries()
        .map(|(key, entry)| (key.storage_key(), *entry))
        .collect();
    serde_json::to_string(&file)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize price cache: {e}")))
}

/// Parse a cache file. Entries with non-finite or non-positive prices are skipped.
pub fn decode_cache(json: &str, ttl: Duration) -> Result<PriceCache, CoreError> {
    let file: CacheFile = serde_json::from_str(json)?;
    let mut cache = PriceCache::new(ttl);

    for (key, entry) in file {
        if !entry.price.is_finite() || entry.price <= 0.0 {
            continue;
        }
        // Keys differing only in case collapse to one; keep the newest.
        let key = PriceKey::from_storage_key(&key);
        if cache.entry(&key).map_or(true, |e| e.fetched_at < entry.fetched_at) {
            cache.put_at(key, entry.price, entry.fetched_at);
        }
    }

    Ok(cache)
}
