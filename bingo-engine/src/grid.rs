//! Card geometry, cell labels and the per-player marked set.
use std::collections::BTreeSet;

use crate::constants::{FREE_SPACE_LABEL, GENERATED_LABEL_PREFIX};
use crate::error::{EngineError, IndexRejection, Result};

/// Flat row-major cell index, `row * side + column`.
pub type CellIndex = usize;

/// Fixed square geometry of one card: side length and the free cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridLayout {
    side: usize,
    free_index: CellIndex,
}

impl GridLayout {
    /// Build a layout with an explicit free cell.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidGrid`] for a zero side, a side whose
    /// square overflows, or a free cell outside the card.
    pub fn new(side: usize, free_index: CellIndex) -> Result<Self> {
        let cells = side.checked_mul(side).unwrap_or(0);
        if side == 0 || cells == 0 || free_index >= cells {
            return Err(EngineError::InvalidGrid { side, free_index });
        }
        Ok(Self { side, free_index })
    }

    /// Build a layout whose free cell is the middle index `side * side / 2`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidGrid`] when `side` is zero.
    pub fn centred(side: usize) -> Result<Self> {
        Self::new(side, side.saturating_mul(side) / 2)
    }

    #[must_use]
    pub const fn side(&self) -> usize {
        self.side
    }

    #[must_use]
    pub const fn free_index(&self) -> CellIndex {
        self.free_index
    }

    /// Number of cells on the card (`side²`).
    #[must_use]
    pub const fn cells(&self) -> usize {
        self.side * self.side
    }

    #[must_use]
    pub const fn contains(&self, index: CellIndex) -> bool {
        index < self.cells()
    }

    #[must_use]
    pub const fn is_free(&self, index: CellIndex) -> bool {
        index == self.free_index
    }

    /// `(row, column)` of an index.
    #[must_use]
    pub const fn position(&self, index: CellIndex) -> (usize, usize) {
        (index / self.side, index % self.side)
    }

    /// Reject indices the player may not toggle.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidIndex`] for out-of-range indices and for
    /// the free cell.
    pub fn check_markable(&self, index: CellIndex) -> Result<CellIndex> {
        if !self.contains(index) {
            return Err(EngineError::InvalidIndex {
                index,
                reason: IndexRejection::OutOfRange {
                    cells: self.cells(),
                },
            });
        }
        if self.is_free(index) {
            return Err(EngineError::InvalidIndex {
                index,
                reason: IndexRejection::FreeCell,
            });
        }
        Ok(index)
    }
}

/// Display text for every cell of a card, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLabels {
    labels: Vec<String>,
}

impl CardLabels {
    /// Wrap labels after checking there is exactly one per cell.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LabelCountMismatch`] when the list length is not
    /// `side²`.
    pub fn new(layout: &GridLayout, labels: Vec<String>) -> Result<Self> {
        if labels.len() != layout.cells() {
            return Err(EngineError::LabelCountMismatch {
                expected: layout.cells(),
                actual: labels.len(),
            });
        }
        Ok(Self { labels })
    }

    /// Placeholder card used when no default content fits the layout.
    #[must_use]
    pub fn generated(layout: &GridLayout) -> Self {
        let labels = (0..layout.cells())
            .map(|index| {
                if layout.is_free(index) {
                    FREE_SPACE_LABEL.to_string()
                } else {
                    format!("{GENERATED_LABEL_PREFIX} {}", index + 1)
                }
            })
            .collect();
        Self { labels }
    }

    #[must_use]
    pub fn get(&self, index: CellIndex) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<String> {
        self.labels
    }
}

/// Indices currently marked on one card. The free cell is always a member and
/// can be neither inserted nor removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedSet {
    layout: GridLayout,
    indices: BTreeSet<CellIndex>,
}

impl MarkedSet {
    /// Fresh set holding only the free cell.
    #[must_use]
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            indices: BTreeSet::from([layout.free_index()]),
        }
    }

    /// Rebuild a set from stored indices. The free cell is added if missing.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidIndex`] for an index outside the card.
    pub fn from_indices(
        layout: GridLayout,
        indices: impl IntoIterator<Item = CellIndex>,
    ) -> Result<Self> {
        let mut set = Self::new(layout);
        for index in indices {
            if !layout.contains(index) {
                return Err(EngineError::InvalidIndex {
                    index,
                    reason: IndexRejection::OutOfRange {
                        cells: layout.cells(),
                    },
                });
            }
            set.indices.insert(index);
        }
        Ok(set)
    }

    #[must_use]
    pub const fn layout(&self) -> &GridLayout {
        &self.layout
    }

    #[must_use]
    pub fn contains(&self, index: CellIndex) -> bool {
        self.indices.contains(&index)
    }

    /// Cardinality of the set, free cell included. This is the card score.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Never true: the free cell is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.indices.iter().copied()
    }

    /// Insert one index, returning `false` if it was already marked.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidIndex`] for out-of-range indices and the
    /// free cell.
    pub fn insert(&mut self, index: CellIndex) -> Result<bool> {
        let index = self.layout.check_markable(index)?;
        Ok(self.indices.insert(index))
    }

    /// Remove one index, returning `false` if it was not marked.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidIndex`] for out-of-range indices and the
    /// free cell.
    pub fn remove(&mut self, index: CellIndex) -> Result<bool> {
        let index = self.layout.check_markable(index)?;
        Ok(self.indices.remove(&index))
    }
}
