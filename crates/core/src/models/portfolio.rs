use std::collections::{BTreeMap, HashMap};

use crate::errors::CoreError;

use super::holding::{normalize_ticker, Holding};

/// A named, ordered collection of holdings.
///
/// Keeps a ticker → position index next to the holdings so duplicate
/// checks and lookups are O(1). The index is rebuilt after any removal
/// or insertion that shifts positions.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    pub name: String,
    holdings: Vec<Holding>,
    index: HashMap<String, usize>,
}

impl PartialEq for Portfolio {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.holdings == other.holdings
    }
}

impl Portfolio {
    /// Create an empty portfolio.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            holdings: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a portfolio from already-constructed holdings, rejecting duplicate tickers.
    pub fn from_holdings(name: impl Into<String>, holdings: Vec<Holding>) -> Result<Self, CoreError> {
        let mut portfolio = Self::new(name);
        for holding in holdings {
            portfolio.push(holding)?;
        }
        Ok(portfolio)
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    /// Mutable access for valuation. Tickers must not be changed through this.
    pub(crate) fn holdings_mut(&mut self) -> &mut [Holding] {
        &mut self.holdings
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Holding> {
        self.holdings.get(index)
    }

    /// Position of the holding with this ticker (case-insensitive).
    pub fn position_of(&self, ticker: &str) -> Option<usize> {
        self.index.get(&normalize_ticker(ticker)).copied()
    }

    pub fn find(&self, ticker: &str) -> Option<&Holding> {
        self.position_of(ticker).map(|idx| &self.holdings[idx])
    }

    pub fn contains_ticker(&self, ticker: &str) -> bool {
        self.index.contains_key(&normalize_ticker(ticker))
    }

    /// Distinct, non-empty tickers in holding order.
    pub fn tickers(&self) -> Vec<String> {
        self.holdings
            .iter()
            .map(|h| h.ticker.clone())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Append a holding. Returns its position.
    pub fn push(&mut self, holding: Holding) -> Result<usize, CoreError> {
        let len = self.holdings.len();
        self.insert(len, holding)
    }

    /// Insert at `position`, clamped to the end of the list. Returns the actual position.
    pub fn insert(&mut self, position: usize, holding: Holding) -> Result<usize, CoreError> {
        if self.contains_ticker(&holding.ticker) {
            return Err(CoreError::DuplicateTicker {
                portfolio: self.name.clone(),
                ticker: holding.ticker,
            });
        }
        let position = position.min(self.holdings.len());
        self.holdings.insert(position, holding);
        self.reindex();
        Ok(position)
    }

    pub fn remove(&mut self, index: usize) -> Result<Holding, CoreError> {
        self.check_index(index)?;
        let removed = self.holdings.remove(index);
        self.reindex();
        Ok(removed)
    }

    /// Replace the holding at `index`. The replacement must keep the same ticker.
    pub fn replace(&mut self, index: usize, holding: Holding) -> Result<Holding, CoreError> {
        self.check_index(index)?;
        if self.holdings[index].ticker != holding.ticker {
            return Err(CoreError::ValidationError(format!(
                "Cannot replace {} with {}: tickers are immutable",
                self.holdings[index].ticker, holding.ticker
            )));
        }
        Ok(std::mem::replace(&mut self.holdings[index], holding))
    }

    pub fn check_index(&self, index: usize) -> Result<(), CoreError> {
        if index >= self.holdings.len() {
            return Err(CoreError::HoldingIndexOutOfRange {
                index,
                len: self.holdings.len(),
            });
        }
        Ok(())
    }

    fn reindex(&mut self) {
        self.index = self
            .holdings
            .iter()
            .enumerate()
            .map(|(i, h)| (h.ticker.clone(), i))
            .collect();
    }
}

/// All portfolios, keyed by display name. Names are unique case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioBook {
    portfolios: BTreeMap<String, Portfolio>,
}

impl PortfolioBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a user-typed name to the stored display name.
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        let wanted = name.trim().to_lowercase();
        self.portfolios
            .keys()
            .find(|k| k.trim().to_lowercase() == wanted)
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve_name(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Portfolio> {
        let key = self.resolve_name(name)?.to_string();
        self.portfolios.get(&key)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Portfolio> {
        let key = self.resolve_name(name)?.to_string();
        self.portfolios.get_mut(&key)
    }

    /// Like `get_mut`, but a missing portfolio is an error.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Portfolio, CoreError> {
        self.get_mut(name)
            .ok_or_else(|| CoreError::PortfolioNotFound(name.to_string()))
    }

    pub fn require(&self, name: &str) -> Result<&Portfolio, CoreError> {
        self.get(name)
            .ok_or_else(|| CoreError::PortfolioNotFound(name.to_string()))
    }

    pub fn insert(&mut self, portfolio: Portfolio) -> Result<(), CoreError> {
        if let Some(existing) = self.resolve_name(&portfolio.name) {
            return Err(CoreError::PortfolioExists(existing.to_string()));
        }
        self.portfolios.insert(portfolio.name.clone(), portfolio);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Portfolio> {
        let key = self.resolve_name(name)?.to_string();
        self.portfolios.remove(&key)
    }

    pub fn names(&self) -> Vec<&str> {
        self.portfolios.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Portfolio> {
        self.portfolios.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Portfolio> {
        self.portfolios.values_mut()
    }

    pub fn len(&self) -> usize {
        self.portfolios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }
}
