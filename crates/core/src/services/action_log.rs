use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::action::UndoAction;
use crate::models::event::{ChangeKind, ChangeNotice};
use crate::models::portfolio::{Portfolio, PortfolioBook};

/// Result of a successful undo or redo.
#[derive(Debug, Clone, PartialEq)]
pub struct Replayed {
    /// Portfolio whose holdings changed and needs revaluing.
    pub portfolio: String,
    pub notice: ChangeNotice,
}

/// Linear undo/redo history of holding mutations.
///
/// `record` is the only way new history enters and it always discards
/// the redo stack. Undo moves a record to the redo stack (as its
/// inverse); redo moves it back.
#[derive(Debug, Default)]
pub struct ActionLog {
    undo_stack: Vec<UndoAction>,
    redo_stack: Vec<UndoAction>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a freshly applied mutation and drop any redo history.
    pub fn record(&mut self, action: UndoAction) {
        debug!(kind = action.label(), portfolio = action.portfolio(), "Recorded action");
        self.undo_stack.push(action);
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Most recent undoable action, if any.
    pub fn peek_undo(&self) -> Option<&UndoAction> {
        self.undo_stack.last()
    }

    pub fn peek_redo(&self) -> Option<&UndoAction> {
        self.redo_stack.last()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Drop every record that targets `portfolio` (used when it is deleted).
    pub fn forget_portfolio(&mut self, portfolio: &str) {
        let wanted = portfolio.trim().to_lowercase();
        let keep = |a: &UndoAction| a.portfolio().trim().to_lowercase() != wanted;
        self.undo_stack.retain(keep);
        self.redo_stack.retain(keep);
    }

    /// Reverse the most recent action.
    ///
    /// If the reversal itself fails the record goes back on the undo
    /// stack and the book is left untouched.
    pub fn undo(&mut self, book: &mut PortfolioBook) -> Result<Replayed, CoreError> {
        let action = self.undo_stack.pop().ok_or(CoreError::NothingToUndo)?;
        match Self::revert(book, &action) {
            Ok((inverse, notice)) => {
                self.redo_stack.push(inverse);
                Ok(Replayed {
                    portfolio: action.portfolio().to_string(),
                    notice,
                })
            }
            Err(e) => {
                warn!(kind = action.label(), error = %e, "Undo failed");
                self.undo_stack.push(action);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone action.
    pub fn redo(&mut self, book: &mut PortfolioBook) -> Result<Replayed, CoreError> {
        let action = self.redo_stack.pop().ok_or(CoreError::NothingToRedo)?;
        match Self::reapply(book, &action) {
            Ok((record, notice)) => {
                self.undo_stack.push(record);
                Ok(Replayed {
                    portfolio: action.portfolio().to_string(),
                    notice,
                })
            }
            Err(e) => {
                warn!(kind = action.label(), error = %e, "Redo failed");
                self.redo_stack.push(action);
                Err(e)
            }
        }
    }

    /// Undo one action. Returns the record that redoes it.
    fn revert(book: &mut PortfolioBook, action: &UndoAction) -> Result<(UndoAction, ChangeNotice), CoreError> {
        let portfolio = book.require_mut(action.portfolio())?;
        let name = portfolio.name.clone();

        match action {
            UndoAction::Add { holding, .. } => {
                let idx = locate(portfolio, &holding.ticker)?;
                let removed = portfolio.remove(idx)?;
                let notice = notice(ChangeKind::Undo, &name, &removed.name, format!("Removed {}", removed.ticker));
                Ok((UndoAction::Add { portfolio: name, holding: removed }, notice))
            }
            UndoAction::Modify { before, .. } => {
                let idx = locate(portfolio, &before.ticker)?;
                let current = portfolio.replace(idx, before.clone())?;
                let notice = notice(
                    ChangeKind::Undo,
                    &name,
                    &before.name,
                    format!("Reverted changes to {}", before.ticker),
                );
                Ok((UndoAction::Modify { portfolio: name, before: current, index: idx }, notice))
            }
            UndoAction::Remove { holding, index, .. } => {
                let pos = portfolio.insert(*index, holding.clone())?;
                let notice = notice(ChangeKind::Undo, &name, &holding.name, format!("Restored {}", holding.ticker));
                Ok((
                    UndoAction::Remove {
                        portfolio: name,
                        holding: holding.clone(),
                        index: pos,
                    },
                    notice,
                ))
            }
        }
    }

    /// Redo one action. Returns the record that undoes it again.
    fn reapply(book: &mut PortfolioBook, action: &UndoAction) -> Result<(UndoAction, ChangeNotice), CoreError> {
        let portfolio = book.require_mut(action.portfolio())?;
        let name = portfolio.name.clone();

        match action {
            UndoAction::Add { holding, .. } => {
                portfolio.push(holding.clone())?;
                let notice = notice(ChangeKind::Redo, &name, &holding.name, format!("Re-added {}", holding.ticker));
                Ok((
                    UndoAction::Add {
                        portfolio: name,
                        holding: holding.clone(),
                    },
                    notice,
                ))
            }
            UndoAction::Modify { before: target, .. } => {
                let idx = locate(portfolio, &target.ticker)?;
                let prior = portfolio.replace(idx, target.clone())?;
                let notice = notice(
                    ChangeKind::Redo,
                    &name,
                    &target.name,
                    format!("Re-applied changes to {}", target.ticker),
                );
                Ok((UndoAction::Modify { portfolio: name, before: prior, index: idx }, notice))
            }
            UndoAction::Remove { holding, .. } => {
                let idx = locate(portfolio, &holding.ticker)?;
                let removed = portfolio.remove(idx)?;
                let notice = notice(ChangeKind::Redo, &name, &removed.name, format!("Re-removed {}", removed.ticker));
                Ok((
                    UndoAction::Remove {
                        portfolio: name,
                        holding: removed,
                        index: idx,
                    },
                    notice,
                ))
            }
        }
    }
}

fn locate(portfolio: &Portfolio, ticker: &str) -> Result<usize, CoreError> {
    portfolio
        .position_of(ticker)
        .ok_or_else(|| CoreError::HoldingNotFound(ticker.to_string()))
}

fn notice(kind: ChangeKind, portfolio: &str, holding: &str, detail: String) -> ChangeNotice {
    ChangeNotice::new(kind, portfolio, holding, detail)
}
