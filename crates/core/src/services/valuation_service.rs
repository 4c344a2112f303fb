use std::collections::HashMap;

use tracing::debug;

use crate::models::analytics::{BookSummary, PortfolioSummary};
use crate::models::holding::Holding;
use crate::models::portfolio::{Portfolio, PortfolioBook};
use crate::models::price::Quote;
use crate::services::price_service::PriceService;

/// Maps resolved prices onto holdings and derives profit/loss figures.
///
/// Absent prices are valued at zero rather than failing the refresh, so a
/// partial provider outage still yields a complete (if stale) portfolio.
pub struct ValuationService;

impl ValuationService {
    pub fn new() -> Self {
        Self
    }

    /// Re-price every holding of `portfolio` and return its aggregates.
    pub async fn refresh(&self, price_service: &PriceService, portfolio: &mut Portfolio) -> PortfolioSummary {
        let tickers = portfolio.tickers();
        let quotes = if tickers.is_empty() {
            HashMap::new()
        } else {
            price_service.resolve_quotes(&tickers).await
        };
        self.apply_quotes(portfolio, &quotes);
        debug!(portfolio = %portfolio.name, holdings = portfolio.len(), "Portfolio revalued");
        self.summarize(portfolio)
    }

    /// Apply already-resolved quotes. Tickers missing from `quotes` are valued at zero.
    pub fn apply_quotes(&self, portfolio: &mut Portfolio, quotes: &HashMap<String, Quote>) {
        for holding in portfolio.holdings_mut() {
            let quote = quotes.get(&holding.ticker).copied().unwrap_or_default();
            Self::value_holding(holding, quote);
        }
    }

    /// Recompute every derived field of one holding.
    pub fn value_holding(holding: &mut Holding, quote: Quote) {
        holding.recompute_investment();

        let current_price = quote.current.unwrap_or(0.0);
        holding.current_price = current_price;
        holding.current_value = holding.quantity * current_price;
        holding.profit_loss = holding.current_value - holding.investment_value;
        holding.profit_loss_pct = if holding.investment_value != 0.0 {
            holding.profit_loss / holding.investment_value * 100.0
        } else {
            0.0
        };

        match quote.previous_close {
            Some(prev) if prev != 0.0 && current_price != 0.0 => {
                holding.daily_return_pct = (current_price - prev) / prev * 100.0;
                holding.daily_pl = holding.quantity * (current_price - prev);
            }
            _ => {
                holding.daily_return_pct = 0.0;
                holding.daily_pl = 0.0;
            }
        }
    }

    /// Aggregate the derived fields as they currently stand.
    pub fn summarize(&self, portfolio: &Portfolio) -> PortfolioSummary {
        let mut summary = PortfolioSummary {
            name: portfolio.name.clone(),
            holdings: portfolio.len(),
            ..PortfolioSummary::default()
        };

        for holding in portfolio.holdings() {
            summary.total_investment += holding.investment_value;
            summary.total_current_value += holding.current_value;
            summary.total_profit_loss += holding.profit_loss;
            summary.total_daily_pl += holding.daily_pl;
            if holding.current_price <= 0.0 {
                summary.unpriced.push(holding.ticker.clone());
            }
        }

        summary.total_profit_loss_pct = ratio_pct(summary.total_profit_loss, summary.total_investment);
        summary.daily_return_pct = ratio_pct(summary.total_daily_pl, summary.total_current_value);
        summary
    }

    /// Totals across every portfolio in the book, from summed absolute values.
    pub fn summarize_book(&self, book: &PortfolioBook) -> BookSummary {
        let portfolios: Vec<PortfolioSummary> = book.iter().map(|p| self.summarize(p)).collect();

        let mut total = BookSummary::default();
        for p in &portfolios {
            total.total_investment += p.total_investment;
            total.total_current_value += p.total_current_value;
            total.total_profit_loss += p.total_profit_loss;
            total.total_daily_pl += p.total_daily_pl;
        }
        total.total_profit_loss_pct = ratio_pct(total.total_profit_loss, total.total_investment);
        total.daily_return_pct = ratio_pct(total.total_daily_pl, total.total_current_value);
        total.portfolios = portfolios;
        total
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

/// `part / whole × 100`, or 0 when `whole` is not positive.
fn ratio_pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}
