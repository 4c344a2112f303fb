pub mod errors;
pub mod logging;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::collections::HashMap;

use tracing::{debug, info};

use errors::CoreError;
use models::{
    analytics::{BookSummary, PortfolioSummary},
    event::{ChangeNotice, ChangeObserver},
    holding::{HoldingUpdate, NewHolding},
    market::MarketSnapshot,
    portfolio::{Portfolio, PortfolioBook},
    price::{PriceCache, PriceKey, PriceKind},
    settings::Settings,
};
use providers::registry::PriceProviderRegistry;
use services::{
    action_log::ActionLog,
    market_service::MarketService,
    portfolio_service::{Applied, PortfolioService},
    price_service::PriceService,
    valuation_service::ValuationService,
};
use storage::manager::{SaveOutcome, StorageManager};

/// Main entry point for the Stock Tracker core library.
/// Holds every portfolio, the undo history and the services that value them.
#[must_use]
pub struct StockTracker {
    book: PortfolioBook,
    action_log: ActionLog,
    portfolio_service: PortfolioService,
    price_service: PriceService,
    valuation_service: ValuationService,
    market_service: MarketService,
    settings: Settings,
    observers: Vec<Box<dyn ChangeObserver>>,
    /// Tracks whether any mutation has occurred since the last save/load.
    dirty: bool,
}

impl std::fmt::Debug for StockTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockTracker")
            .field("portfolios", &self.book.len())
            .field("settings", &self.settings)
            .field("cached_prices", &self.price_service.cache().lock().len())
            .field("undo", &self.action_log.undo_len())
            .field("redo", &self.action_log.redo_len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl StockTracker {
    /// Load portfolios and the price cache from `settings.data_dir` and
    /// wire up the default providers.
    pub fn open(settings: Settings) -> Result<Self, CoreError> {
        let registry = PriceProviderRegistry::new_with_defaults(&settings.api_keys);
        Self::with_registry(settings, registry)
    }

    /// Same as [`open`](Self::open) with a caller-supplied provider registry.
    pub fn with_registry(settings: Settings, registry: PriceProviderRegistry) -> Result<Self, CoreError> {
        settings.validate()?;

        let book = StorageManager::load_portfolios(&settings.portfolio_path(), &settings.backup_path());
        let cache = PriceCache::load_from_disk(settings.cache_path(), settings.cache_ttl());

        let price_service = PriceService::new(registry, cache.into_shared())
            .with_limits(settings.max_workers, settings.fetch_timeout())
            .with_history_range(settings.history_range.clone());

        info!(
            portfolios = book.len(),
            providers = ?price_service.provider_names(),
            workers = price_service.max_workers(),
            "Stock tracker opened"
        );

        Ok(Self {
            book,
            action_log: ActionLog::new(),
            portfolio_service: PortfolioService::new(),
            price_service,
            valuation_service: ValuationService::new(),
            market_service: MarketService::new(),
            settings,
            observers: Vec::new(),
            dirty: false,
        })
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Write portfolios to the primary file (backup on failure).
    /// Clears the unsaved-changes flag on success.
    pub fn save(&mut self) -> Result<SaveOutcome, CoreError> {
        let outcome = StorageManager::save_portfolios(
            &self.book,
            &self.settings.portfolio_path(),
            &self.settings.backup_path(),
        )?;
        self.dirty = false;
        Ok(outcome)
    }

    /// Persist the price cache, then the portfolios.
    pub fn shutdown(&mut self) -> Result<SaveOutcome, CoreError> {
        self.persist_cache();
        let outcome = self.save()?;
        info!(?outcome, "Stock tracker shut down");
        Ok(outcome)
    }

    /// Best-effort cache write. Returns whether it succeeded.
    pub fn persist_cache(&self) -> bool {
        self.price_service
            .cache()
            .lock()
            .persist_to_disk(self.settings.cache_path())
    }

    /// Returns `true` if portfolios changed since the last save or load.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    // ── Portfolio Management ────────────────────────────────────────

    pub fn create_portfolio(&mut self, name: &str) -> Result<(), CoreError> {
        let notice = self.portfolio_service.create_portfolio(&mut self.book, name)?;
        self.emit(notice);
        self.dirty = true;
        Ok(())
    }

    /// Delete a portfolio. Not undoable; its undo/redo history is dropped.
    pub fn delete_portfolio(&mut self, name: &str) -> Result<Portfolio, CoreError> {
        let (removed, notice) = self.portfolio_service.delete_portfolio(&mut self.book, name)?;
        self.action_log.forget_portfolio(&removed.name);
        self.emit(notice);
        self.dirty = true;
        Ok(removed)
    }

    #[must_use]
    pub fn portfolio(&self, name: &str) -> Option<&Portfolio> {
        self.book.get(name)
    }

    #[must_use]
    pub fn portfolio_names(&self) -> Vec<String> {
        self.book.names().into_iter().map(str::to_string).collect()
    }

    #[must_use]
    pub fn book(&self) -> &PortfolioBook {
        &self.book
    }

    // ── Holdings ────────────────────────────────────────────────────
    //
    // Every mutation is recorded for undo and the affected portfolio is
    // revalued before returning.

    pub async fn add_holding(&mut self, portfolio: &str, input: NewHolding) -> Result<PortfolioSummary, CoreError> {
        let applied = self.portfolio_service.add_holding(&mut self.book, portfolio, input)?;
        self.commit(applied).await
    }

    pub async fn modify_holding(
        &mut self,
        portfolio: &str,
        index: usize,
        update: &HoldingUpdate,
    ) -> Result<PortfolioSummary, CoreError> {
        let applied = self
            .portfolio_service
            .modify_holding(&mut self.book, portfolio, index, update)?;
        self.commit(applied).await
    }

    /// Buy more of a held ticker at `price`; the purchase price becomes the weighted average.
    pub async fn add_to_position(
        &mut self,
        portfolio: &str,
        ticker: &str,
        quantity: f64,
        price: f64,
    ) -> Result<PortfolioSummary, CoreError> {
        let applied = self
            .portfolio_service
            .add_to_position(&mut self.book, portfolio, ticker, quantity, price)?;
        self.commit(applied).await
    }

    pub async fn remove_holding(&mut self, portfolio: &str, index: usize) -> Result<PortfolioSummary, CoreError> {
        let applied = self.portfolio_service.remove_holding(&mut self.book, portfolio, index)?;
        self.commit(applied).await
    }

    pub async fn remove_quantity(
        &mut self,
        portfolio: &str,
        index: usize,
        quantity: f64,
    ) -> Result<PortfolioSummary, CoreError> {
        let applied = self
            .portfolio_service
            .remove_quantity(&mut self.book, portfolio, index, quantity)?;
        self.commit(applied).await
    }

    // ── Undo / Redo ─────────────────────────────────────────────────

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.action_log.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.action_log.can_redo()
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.action_log
    }

    /// Revert the most recent holding change and revalue its portfolio.
    pub async fn undo(&mut self) -> Result<PortfolioSummary, CoreError> {
        let replayed = self.action_log.undo(&mut self.book)?;
        self.emit(replayed.notice);
        self.dirty = true;
        self.refresh_portfolio(&replayed.portfolio).await
    }

    /// Re-apply the most recently undone change and revalue its portfolio.
    pub async fn redo(&mut self) -> Result<PortfolioSummary, CoreError> {
        let replayed = self.action_log.redo(&mut self.book)?;
        self.emit(replayed.notice);
        self.dirty = true;
        self.refresh_portfolio(&replayed.portfolio).await
    }

    // ── Valuation ───────────────────────────────────────────────────

    /// Resolve prices for one portfolio and recompute its derived fields.
    pub async fn refresh_portfolio(&mut self, name: &str) -> Result<PortfolioSummary, CoreError> {
        let portfolio = self.book.require_mut(name)?;
        Ok(self.valuation_service.refresh(&self.price_service, portfolio).await)
    }

    /// Revalue every portfolio from a single batch of lookups.
    pub async fn refresh_all(&mut self) -> BookSummary {
        let tickers: Vec<String> = self.book.iter().flat_map(|p| p.tickers()).collect();
        let quotes = if tickers.is_empty() {
            HashMap::new()
        } else {
            self.price_service.resolve_quotes(&tickers).await
        };
        for portfolio in self.book.iter_mut() {
            self.valuation_service.apply_quotes(portfolio, &quotes);
        }
        debug!(portfolios = self.book.len(), tickers = tickers.len(), "All portfolios revalued");
        self.book_summary()
    }

    /// Aggregates from the last refresh, without fetching.
    pub fn summary(&self, name: &str) -> Result<PortfolioSummary, CoreError> {
        let portfolio = self.book.require(name)?;
        Ok(self.valuation_service.summarize(portfolio))
    }

    #[must_use]
    pub fn book_summary(&self) -> BookSummary {
        self.valuation_service.summarize_book(&self.book)
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Fresh cached price, if any. Never fetches.
    #[must_use]
    pub fn cached_price(&self, ticker: &str, kind: PriceKind) -> Option<f64> {
        self.price_service.cache().lock().get(&PriceKey::new(ticker, kind))
    }

    /// Resolve one kind of price for a batch of tickers, outside any portfolio.
    pub async fn resolve_prices(&self, tickers: &[String], kind: PriceKind) -> HashMap<String, Option<f64>> {
        self.price_service.resolve_prices(tickers, kind).await
    }

    /// Index levels, day changes and open/closed status. Uses the price cache.
    pub async fn market_snapshot(&self) -> MarketSnapshot {
        self.market_service.snapshot(&self.price_service).await
    }

    pub fn clear_cache(&self) {
        self.price_service.cache().lock().clear();
    }

    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.price_service.provider_names()
    }

    // ── Settings & Observers ────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register an observer. It receives every notice from now on.
    pub fn add_observer(&mut self, observer: Box<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    // ── Internal ────────────────────────────────────────────────────

    async fn commit(&mut self, applied: Applied) -> Result<PortfolioSummary, CoreError> {
        let portfolio = applied.action.portfolio().to_string();
        self.action_log.record(applied.action);
        self.emit(applied.notice);
        self.dirty = true;
        self.refresh_portfolio(&portfolio).await
    }

    fn emit(&self, notice: ChangeNotice) {
        info!(
            kind = %notice.kind,
            portfolio = %notice.portfolio,
            holding = %notice.holding,
            detail = %notice.detail,
            "Portfolio changed"
        );
        for observer in &self.observers {
            observer.notify(&notice);
        }
    }
}
