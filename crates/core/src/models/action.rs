use super::holding::Holding;

/// One reversible portfolio mutation.
///
/// Each variant carries a full snapshot of the holding involved, so
/// reversal never depends on positions that later removals may shift.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// A holding was appended.
    Add { portfolio: String, holding: Holding },

    /// The holding at `index` was changed; `before` is its prior state.
    /// Undo pushes the inverse, whose `before` is the state being replaced.
    Modify {
        portfolio: String,
        before: Holding,
        index: usize,
    },

    /// The holding at `index` was removed.
    Remove {
        portfolio: String,
        holding: Holding,
        index: usize,
    },
}

impl UndoAction {
    pub fn portfolio(&self) -> &str {
        match self {
            UndoAction::Add { portfolio, .. }
            | UndoAction::Modify { portfolio, .. }
            | UndoAction::Remove { portfolio, .. } => portfolio,
        }
    }

    pub fn holding(&self) -> &Holding {
        match self {
            UndoAction::Add { holding, .. } | UndoAction::Remove { holding, .. } => holding,
            UndoAction::Modify { before, .. } => before,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UndoAction::Add { .. } => "add",
            UndoAction::Modify { .. } => "modify",
            UndoAction::Remove { .. } => "remove",
        }
    }
}
