use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::storage::manager::StorageManager;

/// Prices older than this are treated as absent.
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 15;

/// Suffix used for previous-close entries in the persisted cache file.
pub const PREVIOUS_CLOSE_SUFFIX: &str = "_prev";

/// Which price of a ticker is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceKind {
    /// Most recent close.
    Current,
    /// Close of the session before the most recent one.
    PreviousClose,
}

impl std::fmt::Display for PriceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceKind::Current => write!(f, "current"),
            PriceKind::PreviousClose => write!(f, "previous close"),
        }
    }
}

/// Cache key. Previous closes live in their own namespace so they can
/// never be mistaken for a current price.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub ticker: String,
    pub kind: PriceKind,
}

impl PriceKey {
    pub fn new(ticker: &str, kind: PriceKind) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            kind,
        }
    }

    pub fn current(ticker: &str) -> Self {
        Self::new(ticker, PriceKind::Current)
    }

    pub fn previous_close(ticker: &str) -> Self {
        Self::new(ticker, PriceKind::PreviousClose)
    }

    /// Flat string form used in the cache file: `AAPL` or `AAPL_prev`.
    pub fn storage_key(&self) -> String {
        match self.kind {
            PriceKind::Current => self.ticker.clone(),
            PriceKind::PreviousClose => format!("{}{PREVIOUS_CLOSE_SUFFIX}", self.ticker),
        }
    }

    pub fn from_storage_key(key: &str) -> Self {
        match key.strip_suffix(PREVIOUS_CLOSE_SUFFIX) {
            Some(ticker) => Self::previous_close(ticker),
            None => Self::current(key),
        }
    }
}

/// Both prices of one ticker after a refresh. `None` means the lookup failed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quote {
    pub current: Option<f64>,
    pub previous_close: Option<f64>,
}

impl Quote {
    /// Read both prices off a trailing close series (oldest first).
    /// The previous close needs at least two sessions; non-positive closes count as absent.
    pub fn from_closes(closes: &[f64]) -> Self {
        let usable = |p: &f64| p.is_finite() && *p > 0.0;
        let current = closes.last().copied().filter(usable);
        let previous_close = closes
            .len()
            .checked_sub(2)
            .and_then(|i| closes.get(i))
            .copied()
            .filter(usable);
        Self {
            current,
            previous_close,
        }
    }

    pub fn get(&self, kind: PriceKind) -> Option<f64> {
        match kind {
            PriceKind::Current => self.current,
            PriceKind::PreviousClose => self.previous_close,
        }
    }
}

/// A price and the moment it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Time-bounded store of last-seen prices.
///
/// Expiry is lazy: an entry older than the TTL is reported as a miss on
/// read but stays in the map until it is overwritten or pruned.
#[derive(Debug, Clone)]
pub struct PriceCache {
    entries: HashMap<PriceKey, CacheEntry>,
    ttl: Duration,
}

/// The cache as shared between fetch tasks. Every read and write goes through the lock.
pub type SharedPriceCache = Arc<Mutex<PriceCache>>;

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_CACHE_TTL_MINUTES))
    }
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn into_shared(self) -> SharedPriceCache {
        Arc::new(Mutex::new(self))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh price for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &PriceKey) -> Option<f64> {
        self.get_at(key, Utc::now())
    }

    /// Same as [`get`](Self::get) with an explicit clock.
    pub fn get_at(&self, key: &PriceKey, now: DateTime<Utc>) -> Option<f64> {
        self.entries
            .get(key)
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| entry.price)
    }

    /// Fresh quote for `ticker`, or `None` if its current price is absent or expired.
    ///
    /// One lookup writes both prices, so a fresh current price without a
    /// fresh previous close means that lookup saw a single session.
    pub fn quote(&self, ticker: &str) -> Option<Quote> {
        self.quote_at(ticker, Utc::now())
    }

    pub fn quote_at(&self, ticker: &str, now: DateTime<Utc>) -> Option<Quote> {
        let current = self.get_at(&PriceKey::current(ticker), now)?;
        Some(Quote {
            current: Some(current),
            previous_close: self.get_at(&PriceKey::previous_close(ticker), now),
        })
    }

    /// Insert or overwrite, stamped with the current time.
    pub fn put(&mut self, key: PriceKey, price: f64) {
        self.put_at(key, price, Utc::now());
    }

    pub fn put_at(&mut self, key: PriceKey, price: f64, fetched_at: DateTime<Utc>) {
        self.entries.insert(key, CacheEntry { price, fetched_at });
    }

    pub fn remove(&mut self, key: &PriceKey) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Raw entry, ignoring the TTL.
    pub fn entry(&self, key: &PriceKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&PriceKey, &CacheEntry)> {
        self.entries.iter()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now - entry.fetched_at < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Best-effort load. A missing or unreadable file yields an empty cache.
    pub fn load_from_disk(path: impl AsRef<Path>, ttl: Duration) -> Self {
        StorageManager::load_cache(path.as_ref(), ttl)
    }

    /// Best-effort save. Failures are logged and swallowed.
    pub fn persist_to_disk(&self, path: impl AsRef<Path>) -> bool {
        StorageManager::persist_cache(self, path.as_ref())
    }
}
