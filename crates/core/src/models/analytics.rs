use serde::{Deserialize, Serialize};

/// Aggregate valuation of one portfolio.
///
/// Percentages are ratios of the summed absolute figures, never an
/// average of per-holding percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Portfolio display name
    pub name: String,

    /// Number of holdings
    pub holdings: usize,

    /// Sum of quantity × purchase price
    pub total_investment: f64,

    /// Sum of quantity × current price
    pub total_current_value: f64,

    /// total_current_value - total_investment
    pub total_profit_loss: f64,

    /// total_profit_loss / total_investment × 100, or 0 with no investment
    pub total_profit_loss_pct: f64,

    /// Sum of per-holding daily P/L
    pub total_daily_pl: f64,

    /// total_daily_pl / total_current_value × 100, or 0 with no current value
    pub daily_return_pct: f64,

    /// Holdings whose current price could not be resolved on the last refresh
    pub unpriced: Vec<String>,
}

/// Totals across every portfolio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub total_investment: f64,
    pub total_current_value: f64,
    pub total_profit_loss: f64,
    pub total_profit_loss_pct: f64,
    pub total_daily_pl: f64,
    pub daily_return_pct: f64,

    /// Per-portfolio breakdown, in name order
    pub portfolios: Vec<PortfolioSummary>,
}
