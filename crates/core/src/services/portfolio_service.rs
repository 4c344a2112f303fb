use crate::errors::CoreError;
use crate::models::action::UndoAction;
use crate::models::event::{ChangeKind, ChangeNotice};
use crate::models::holding::{normalize_ticker, Holding, HoldingUpdate, NewHolding};
use crate::models::portfolio::{Portfolio, PortfolioBook};

/// Quantities closer than this are treated as equal when selling a whole position.
const QUANTITY_EPSILON: f64 = 1e-9;

/// A mutation that went through: the record to push on the undo log and
/// the notice to hand to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub action: UndoAction,
    pub notice: ChangeNotice,
}

/// Creates, deletes and edits portfolios and their holdings.
///
/// Pure business logic with no I/O. Every operation validates
/// its input before touching the book, so a rejected command leaves the
/// state unchanged.
pub struct PortfolioService;

impl PortfolioService {
    pub fn new() -> Self {
        Self
    }

    /// Create an empty portfolio. Names are unique regardless of case.
    pub fn create_portfolio(&self, book: &mut PortfolioBook, name: &str) -> Result<ChangeNotice, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::ValidationError(
                "Portfolio name cannot be empty".into(),
            ));
        }
        book.insert(Portfolio::new(name))?;
        Ok(ChangeNotice::new(ChangeKind::CreatedPortfolio, name, "", ""))
    }

    /// Delete a portfolio and everything in it. Not reversible.
    pub fn delete_portfolio(
        &self,
        book: &mut PortfolioBook,
        name: &str,
    ) -> Result<(Portfolio, ChangeNotice), CoreError> {
        let removed = book
            .remove(name)
            .ok_or_else(|| CoreError::PortfolioNotFound(name.to_string()))?;
        let notice = ChangeNotice::new(
            ChangeKind::DeletedPortfolio,
            removed.name.clone(),
            "",
            format!("Stocks deleted: {}", removed.len()),
        );
        Ok((removed, notice))
    }

    /// Append a new holding. A ticker already present in the portfolio is rejected;
    /// use [`add_to_position`](Self::add_to_position) to grow an existing holding.
    pub fn add_holding(
        &self,
        book: &mut PortfolioBook,
        portfolio_name: &str,
        input: NewHolding,
    ) -> Result<Applied, CoreError> {
        Self::validate_new_holding(&input)?;
        let portfolio = book.require_mut(portfolio_name)?;

        let holding = Holding::new(input);
        portfolio.push(holding.clone())?;

        let notice = ChangeNotice::new(
            ChangeKind::AddedHolding,
            portfolio.name.clone(),
            holding.name.clone(),
            format!("Qty: {} @ {:.2}", holding.quantity, holding.purchase_price),
        );
        Ok(Applied {
            action: UndoAction::Add {
                portfolio: portfolio.name.clone(),
                holding,
            },
            notice,
        })
    }

    /// Change fields of the holding at `index`. The ticker cannot be changed.
    pub fn modify_holding(
        &self,
        book: &mut PortfolioBook,
        portfolio_name: &str,
        index: usize,
        update: &HoldingUpdate,
    ) -> Result<Applied, CoreError> {
        Self::validate_update(update)?;
        let portfolio = book.require_mut(portfolio_name)?;
        portfolio.check_index(index)?;

        let before = portfolio.holdings()[index].clone();
        let mut after = before.clone();
        after.apply_update(update);
        Self::validate_investment(after.quantity, after.purchase_price)?;
        portfolio.replace(index, after.clone())?;

        let notice = ChangeNotice::new(
            ChangeKind::ModifiedHolding,
            portfolio.name.clone(),
            after.name,
            format!("Updated fields: {}", update.field_names().join(", ")),
        );
        Ok(Applied {
            action: UndoAction::Modify {
                portfolio: portfolio.name.clone(),
                before,
                index,
            },
            notice,
        })
    }

    /// Buy more of an existing holding. The purchase price becomes the
    /// quantity-weighted average of the old and new lots.
    pub fn add_to_position(
        &self,
        book: &mut PortfolioBook,
        portfolio_name: &str,
        ticker: &str,
        quantity: f64,
        price: f64,
    ) -> Result<Applied, CoreError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Additional quantity must be positive, got {quantity}"
            )));
        }
        Self::validate_price(price)?;

        let portfolio = book.require(portfolio_name)?;
        let index = portfolio
            .position_of(ticker)
            .ok_or_else(|| CoreError::HoldingNotFound(normalize_ticker(ticker)))?;
        let current = &portfolio.holdings()[index];

        let total_quantity = current.quantity + quantity;
        let average_price =
            (current.quantity * current.purchase_price + quantity * price) / total_quantity;

        let update = HoldingUpdate {
            quantity: Some(total_quantity),
            purchase_price: Some(average_price),
            ..HoldingUpdate::default()
        };
        self.modify_holding(book, portfolio_name, index, &update)
    }

    /// Remove the holding at `index` entirely.
    pub fn remove_holding(
        &self,
        book: &mut PortfolioBook,
        portfolio_name: &str,
        index: usize,
    ) -> Result<Applied, CoreError> {
        let portfolio = book.require_mut(portfolio_name)?;
        let holding = portfolio.remove(index)?;

        let notice = ChangeNotice::new(
            ChangeKind::RemovedHolding,
            portfolio.name.clone(),
            holding.name.clone(),
            format!("Qty: {} @ {:.2}", holding.quantity, holding.current_price),
        );
        Ok(Applied {
            action: UndoAction::Remove {
                portfolio: portfolio.name.clone(),
                holding,
                index,
            },
            notice,
        })
    }

    /// Sell part of the holding at `index`. Selling the whole quantity is a
    /// full removal; selling more than is held is rejected.
    pub fn remove_quantity(
        &self,
        book: &mut PortfolioBook,
        portfolio_name: &str,
        index: usize,
        quantity: f64,
    ) -> Result<Applied, CoreError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Quantity to remove must be positive, got {quantity}"
            )));
        }

        let portfolio = book.require(portfolio_name)?;
        portfolio.check_index(index)?;
        let held = portfolio.holdings()[index].quantity;

        if quantity > held + QUANTITY_EPSILON {
            return Err(CoreError::ValidationError(format!(
                "Cannot remove {quantity} of {}: only {held} held",
                portfolio.holdings()[index].ticker
            )));
        }
        if (held - quantity).abs() <= QUANTITY_EPSILON {
            return self.remove_holding(book, portfolio_name, index);
        }

        let update = HoldingUpdate {
            quantity: Some(held - quantity),
            ..HoldingUpdate::default()
        };
        self.modify_holding(book, portfolio_name, index, &update)
    }

    fn validate_new_holding(input: &NewHolding) -> Result<(), CoreError> {
        if input.name.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Stock name cannot be empty".into(),
            ));
        }
        if input.ticker.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Ticker symbol cannot be empty".into(),
            ));
        }
        Self::validate_quantity(input.quantity)?;
        Self::validate_price(input.purchase_price)?;
        Self::validate_investment(input.quantity, input.purchase_price)
    }

    fn validate_update(update: &HoldingUpdate) -> Result<(), CoreError> {
        if update.is_empty() {
            return Err(CoreError::ValidationError("Nothing to update".into()));
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CoreError::ValidationError(
                "Stock name cannot be empty".into(),
            ));
        }
        if let Some(quantity) = update.quantity {
            Self::validate_quantity(quantity)?;
        }
        if let Some(price) = update.purchase_price {
            Self::validate_price(price)?;
        }
        Ok(())
    }

    fn validate_quantity(quantity: f64) -> Result<(), CoreError> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Quantity must be a non-negative number, got {quantity}"
            )));
        }
        Ok(())
    }

    fn validate_price(price: f64) -> Result<(), CoreError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Purchase price must be positive, got {price}"
            )));
        }
        Ok(())
    }

    /// The investment value is written to the file; an overflowing product would not reload.
    fn validate_investment(quantity: f64, price: f64) -> Result<(), CoreError> {
        let investment = quantity * price;
        if !investment.is_finite() {
            return Err(CoreError::ValidationError(format!(
                "Investment value {quantity} x {price} is out of range"
            )));
        }
        Ok(())
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}
