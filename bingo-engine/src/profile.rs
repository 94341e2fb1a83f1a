//! One player's card: labels, marks, awarded lines and reward cursor.
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::{CardLabels, CellIndex, GridLayout, MarkedSet};
use crate::ledger::{CompletionLedger, NewLines};
use crate::rewards::{RewardCursor, RewardList};
use crate::snapshot::ProfileSnapshot;

/// Host-chosen key for a player profile (e.g. a player name).
pub type ProfileId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MarkOutcome {
    Marked { newly_completed: NewLines },
    AlreadyMarked,
}

impl MarkOutcome {
    #[must_use]
    pub const fn has_update(&self) -> bool {
        matches!(self, Self::Marked { .. })
    }

    /// Lines this mark completed for the first time.
    #[must_use]
    pub fn newly_completed(&self) -> &[crate::line::Line] {
        match self {
            Self::Marked { newly_completed } => newly_completed.as_slice(),
            Self::AlreadyMarked => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnmarkOutcome {
    Unmarked { reopened: NewLines },
    NotMarked,
}

impl UnmarkOutcome {
    #[must_use]
    pub const fn has_update(&self) -> bool {
        matches!(self, Self::Unmarked { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    id: ProfileId,
    labels: CardLabels,
    marked: MarkedSet,
    ledger: CompletionLedger,
    cursor: RewardCursor,
}

impl PlayerProfile {
    /// Fresh card: only the free cell marked, nothing awarded, cursor at 0.
    #[must_use]
    pub fn new(id: impl Into<ProfileId>, layout: GridLayout, labels: CardLabels) -> Self {
        Self {
            id: id.into(),
            labels,
            marked: MarkedSet::new(layout),
            ledger: CompletionLedger::new(),
            cursor: RewardCursor::default(),
        }
    }

    pub(crate) fn from_parts(
        id: ProfileId,
        labels: CardLabels,
        marked: MarkedSet,
        ledger: CompletionLedger,
        cursor: RewardCursor,
    ) -> Self {
        Self {
            id,
            labels,
            marked,
            ledger,
            cursor,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn layout(&self) -> &GridLayout {
        self.marked.layout()
    }

    #[must_use]
    pub const fn labels(&self) -> &CardLabels {
        &self.labels
    }

    #[must_use]
    pub const fn marked(&self) -> &MarkedSet {
        &self.marked
    }

    #[must_use]
    pub const fn ledger(&self) -> &CompletionLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn cursor(&self) -> &RewardCursor {
        &self.cursor
    }

    #[must_use]
    pub fn is_marked(&self, index: CellIndex) -> bool {
        self.marked.contains(index)
    }

    /// Number of marked cells, free cell included.
    #[must_use]
    pub fn score(&self) -> usize {
        self.marked.len()
    }

    /// Mark a cell and reconcile the card.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidIndex`] for an out-of-range index
    /// or the free cell; the card is left untouched.
    pub fn mark_cell(&mut self, index: CellIndex, rewards: &RewardList) -> Result<MarkOutcome> {
        if !self.marked.insert(index)? {
            return Ok(MarkOutcome::AlreadyMarked);
        }
        let newly_completed = self.reconcile(rewards);
        Ok(MarkOutcome::Marked { newly_completed })
    }

    /// Unmark a cell. Awarded lines through it are reopened so completing
    /// them again pays out again.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidIndex`] for an out-of-range index
    /// or the free cell.
    pub fn unmark_cell(&mut self, index: CellIndex) -> Result<UnmarkOutcome> {
        if !self.marked.remove(index)? {
            return Ok(UnmarkOutcome::NotMarked);
        }
        let reopened = self.ledger.reopen(&self.marked, index);
        Ok(UnmarkOutcome::Unmarked { reopened })
    }

    /// Award lines completed since the last reconcile and move the committed
    /// cursor one step per line.
    pub fn reconcile(&mut self, rewards: &RewardList) -> NewLines {
        let fresh = self.ledger.reconcile(&self.marked);
        self.cursor.advance(fresh.len(), rewards.len());
        fresh
    }

    /// Replace the card text; marks and awards stay as they are.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::LabelCountMismatch`] when the list does
    /// not have one label per cell.
    pub fn set_labels(&mut self, labels: Vec<String>) -> Result<()> {
        self.labels = CardLabels::new(self.layout(), labels)?;
        Ok(())
    }

    pub fn reveal_rewards(&mut self, count: usize, list_len: usize) {
        self.cursor.reveal(count, list_len);
    }

    /// Fit the cursor to a resized reward list, keeping `owed` reveals ahead.
    pub fn normalize_cursor(&mut self, list_len: usize, owed: usize) {
        self.cursor.normalize(list_len, owed);
    }

    /// Clear marks, awards and cursor, keeping the card text.
    pub fn clear_progress(&mut self) {
        self.marked = MarkedSet::new(*self.layout());
        self.ledger = CompletionLedger::new();
        self.cursor = RewardCursor::default();
    }

    #[must_use]
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            grid_labels: self.labels.as_slice().to_vec(),
            marked_indices: self.marked.iter().collect(),
            completed_lines: self.ledger.iter().collect(),
            reward_cursor: self.cursor.committed(),
        }
    }
}
