use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    CreatedPortfolio,
    DeletedPortfolio,
    AddedHolding,
    ModifiedHolding,
    RemovedHolding,
    Undo,
    Redo,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::CreatedPortfolio => write!(f, "CREATED_PORTFOLIO"),
            ChangeKind::DeletedPortfolio => write!(f, "DELETED_PORTFOLIO"),
            ChangeKind::AddedHolding => write!(f, "ADDED_STOCK"),
            ChangeKind::ModifiedHolding => write!(f, "MODIFIED_STOCK"),
            ChangeKind::RemovedHolding => write!(f, "REMOVED_STOCK"),
            ChangeKind::Undo => write!(f, "UNDO"),
            ChangeKind::Redo => write!(f, "REDO"),
        }
    }
}

/// Emitted after every mutation and every undo/redo, for audit trails and UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub kind: ChangeKind,
    pub portfolio: String,
    /// Holding display name, empty for portfolio-level changes
    pub holding: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn new(
        kind: ChangeKind,
        portfolio: impl Into<String>,
        holding: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            portfolio: portfolio.into(),
            holding: holding.into(),
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

impl std::fmt::Display for ChangeNotice {
    /// `timestamp | action | portfolio | holding | detail`, one audit line.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} | {} | {} | {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.kind,
            self.portfolio,
            self.holding,
            self.detail
        )
    }
}

/// Receives change notices. Rendering and persistence are up to the implementor.
pub trait ChangeObserver: Send + Sync {
    fn notify(&self, notice: &ChangeNotice);
}
