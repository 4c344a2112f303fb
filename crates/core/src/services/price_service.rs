use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::errors::CoreError;
use crate::models::price::{PriceKey, PriceKind, Quote, SharedPriceCache};
use crate::providers::registry::PriceProviderRegistry;

/// Default number of concurrent outbound lookups.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Default per-lookup timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves prices for ticker batches, serving fresh entries from the
/// shared cache and fanning the misses out to the providers.
///
/// Fetch strategy:
/// - Partition the batch into cache hits and misses under one lock.
/// - One lookup per miss; a semaphore bounds how many run at once,
///   across every batch issued through this service.
/// - Each lookup has its own timeout. Failures, timeouts and empty
///   histories become `None` for that ticker and never abort the batch.
/// - A successful lookup back-fills both the current price and the
///   previous close, since one trailing history carries both.
pub struct PriceService {
    registry: PriceProviderRegistry,
    cache: SharedPriceCache,
    workers: Semaphore,
    max_workers: usize,
    fetch_timeout: Duration,
    history_range: String,
}

impl PriceService {
    pub fn new(registry: PriceProviderRegistry, cache: SharedPriceCache) -> Self {
        Self {
            registry,
            cache,
            workers: Semaphore::new(DEFAULT_MAX_WORKERS),
            max_workers: DEFAULT_MAX_WORKERS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            history_range: "5d".to_string(),
        }
    }

    /// Override the worker bound and per-lookup timeout. `max_workers` is clamped to at least 1.
    pub fn with_limits(mut self, max_workers: usize, fetch_timeout: Duration) -> Self {
        let max_workers = max_workers.max(1);
        self.workers = Semaphore::new(max_workers);
        self.max_workers = max_workers;
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_history_range(mut self, range: impl Into<String>) -> Self {
        self.history_range = range.into();
        self
    }

    pub fn cache(&self) -> &SharedPriceCache {
        &self.cache
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry.provider_names()
    }

    /// Resolve one kind of price for every ticker in the batch.
    ///
    /// The returned map has exactly one entry per distinct (uppercased)
    /// ticker: `Some(price)` for cache hits and successful lookups,
    /// `None` for failures.
    pub async fn resolve_prices(
        &self,
        tickers: &[String],
        kind: PriceKind,
    ) -> HashMap<String, Option<f64>> {
        let wanted = distinct_tickers(tickers);
        let mut prices: HashMap<String, Option<f64>> = HashMap::with_capacity(wanted.len());
        let mut missing = Vec::new();

        {
            let cache = self.cache.lock();
            for ticker in wanted {
                let cached = match kind {
                    PriceKind::Current => cache.get(&PriceKey::current(&ticker)).map(Some),
                    PriceKind::PreviousClose => cache
                        .get(&PriceKey::previous_close(&ticker))
                        .map(Some)
                        .or_else(|| cache.quote(&ticker).map(|quote| quote.previous_close)),
                };
                match cached {
                    Some(price) => {
                        prices.insert(ticker, price);
                    }
                    None => missing.push(ticker),
                }
            }
        }

        let hits = prices.len();
        let fetched = join_all(missing.iter().map(|ticker| self.fetch_quote(ticker))).await;

        let mut failed = 0;
        for (ticker, quote) in missing.into_iter().zip(fetched) {
            let price = quote.and_then(|q| q.get(kind));
            if price.is_none() {
                failed += 1;
            }
            prices.insert(ticker, price);
        }

        info!(
            kind = %kind,
            hits,
            fetched = prices.len() - hits - failed,
            failed,
            "Resolved price batch"
        );
        prices
    }

    /// Resolve current price and previous close together.
    ///
    /// A ticker is looked up at most once, and only when its current
    /// price is not fresh. A fresh current price with no previous close
    /// is a hit: the lookup that wrote it found a single session.
    pub async fn resolve_quotes(&self, tickers: &[String]) -> HashMap<String, Quote> {
        let wanted = distinct_tickers(tickers);
        let mut quotes: HashMap<String, Quote> = HashMap::with_capacity(wanted.len());
        let mut missing = Vec::new();

        {
            let cache = self.cache.lock();
            for ticker in wanted {
                match cache.quote(&ticker) {
                    Some(quote) => {
                        quotes.insert(ticker, quote);
                    }
                    None => {
                        let cached = Quote {
                            current: None,
                            previous_close: cache.get(&PriceKey::previous_close(&ticker)),
                        };
                        missing.push((ticker, cached));
                    }
                }
            }
        }

        let hits = quotes.len();
        let fetched = join_all(missing.iter().map(|(ticker, _)| self.fetch_quote(ticker))).await;

        let mut failed = 0;
        for ((ticker, cached), fresh) in missing.into_iter().zip(fetched) {
            let quote = match fresh {
                Some(fresh) => fresh,
                None => {
                    failed += 1;
                    cached
                }
            };
            quotes.insert(ticker, quote);
        }

        info!(
            hits,
            fetched = quotes.len() - hits - failed,
            failed,
            "Resolved quote batch"
        );
        quotes
    }

    /// One worker task: wait for a slot, look the ticker up under a
    /// timeout, back-fill the cache. Never fails; problems are logged.
    async fn fetch_quote(&self, ticker: &str) -> Option<Quote> {
        let _permit = self.workers.acquire().await.ok()?;

        let outcome = match tokio::time::timeout(self.fetch_timeout, self.fetch_closes(ticker)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Timeout {
                symbol: ticker.to_string(),
                seconds: self.fetch_timeout.as_secs(),
            }),
        };

        let closes = match outcome {
            Ok(closes) => closes,
            Err(e) if e.is_network() => {
                warn!(ticker, error = %e, "Could not fetch price");
                return None;
            }
            Err(e) => {
                error!(ticker, error = %e, "Unexpected error while fetching price");
                return None;
            }
        };

        let quote = Quote::from_closes(&closes);
        if quote.current.is_none() {
            warn!(ticker, "Provider history had no usable close");
            return None;
        }

        {
            let mut cache = self.cache.lock();
            if let Some(price) = quote.current {
                cache.put(PriceKey::current(ticker), price);
            }
            match quote.previous_close {
                Some(price) => cache.put(PriceKey::previous_close(ticker), price),
                None => {
                    cache.remove(&PriceKey::previous_close(ticker));
                }
            }
        }
        debug!(ticker, current = ?quote.current, previous_close = ?quote.previous_close, "Fetched quote");
        Some(quote)
    }

    /// Ask providers in priority order; the first non-empty history wins.
    async fn fetch_closes(&self, ticker: &str) -> Result<Vec<f64>, CoreError> {
        let mut last_error = None;

        for provider in self.registry.providers() {
            match provider.get_recent_closes(ticker, &self.history_range).await {
                Ok(closes) if closes.last().is_some_and(|p| p.is_finite() && *p > 0.0) => {
                    return Ok(closes);
                }
                Ok(_) => {
                    last_error = Some(CoreError::Api {
                        provider: provider.name().to_string(),
                        message: format!("Empty or invalid history for {ticker}"),
                    });
                }
                Err(e) => {
                    debug!(ticker, provider = provider.name(), error = %e, "Provider failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CoreError::NoProvider))
    }
}

/// Uppercased, trimmed, non-empty, de-duplicated tickers.
fn distinct_tickers(tickers: &[String]) -> BTreeSet<String> {
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}
