//! Completion ledger: which lines have already paid out a reward.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::grid::{CellIndex, MarkedSet};
use crate::line::{Line, detect};

/// Lines newly completed by one reconcile. A single mark can close at most a
/// row, a column and both diagonals.
pub type NewLines = SmallVec<[Line; 4]>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionLedger {
    awarded: BTreeSet<Line>,
}

impl CompletionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = Line>) -> Self {
        Self {
            awarded: lines.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, line: Line) -> bool {
        self.awarded.contains(&line)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.awarded.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.awarded.is_empty()
    }

    /// Awarded lines in tie-break order.
    pub fn iter(&self) -> impl Iterator<Item = Line> + '_ {
        self.awarded.iter().copied()
    }

    /// Detect completed lines, keep the ones not yet awarded, record them and
    /// return them in tie-break order.
    pub fn reconcile(&mut self, marked: &MarkedSet) -> NewLines {
        let fresh: NewLines = detect(marked)
            .into_iter()
            .filter(|line| !self.awarded.contains(line))
            .collect();
        self.awarded.extend(fresh.iter().copied());
        fresh
    }

    /// Drop awarded lines through `index` that are no longer complete, so a
    /// later re-completion pays out again. Returns the dropped lines.
    pub fn reopen(&mut self, marked: &MarkedSet, index: CellIndex) -> NewLines {
        let side = marked.layout().side();
        let reopened: NewLines = self
            .awarded
            .iter()
            .copied()
            .filter(|line| line.covers(index, side) && !line.is_complete(marked))
            .collect();
        for line in &reopened {
            self.awarded.remove(line);
        }
        reopened
    }

    /// Keep only lines that exist on the card and are still complete.
    pub fn retain_complete(&mut self, marked: &MarkedSet) -> usize {
        let before = self.awarded.len();
        self.awarded.retain(|line| line.is_complete(marked));
        before - self.awarded.len()
    }
}
