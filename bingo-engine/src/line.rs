//! Completable lines and the completion detector.
//!
//! A card of side N has 2N + 2 candidate lines. Their derived ordering is the
//! tie-break order used everywhere downstream: rows ascending, then columns
//! ascending, then the main diagonal, then the anti-diagonal.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::grid::{CellIndex, MarkedSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Line {
    Row(usize),
    Column(usize),
    /// Top-left to bottom-right, tag `diag:1`.
    Diagonal,
    /// Top-right to bottom-left, tag `diag:2`.
    AntiDiagonal,
}

impl Line {
    /// Every candidate line of a card, in tie-break order.
    pub fn all(side: usize) -> impl Iterator<Item = Self> {
        (0..side)
            .map(Self::Row)
            .chain((0..side).map(Self::Column))
            .chain([Self::Diagonal, Self::AntiDiagonal])
    }

    /// Whether the line exists on a card of this side.
    #[must_use]
    pub const fn fits(self, side: usize) -> bool {
        match self {
            Self::Row(i) | Self::Column(i) => i < side,
            Self::Diagonal | Self::AntiDiagonal => side > 0,
        }
    }

    /// Indices covered by the line.
    pub fn cells(self, side: usize) -> impl Iterator<Item = CellIndex> {
        (0..side).map(move |i| match self {
            Self::Row(row) => row * side + i,
            Self::Column(col) => i * side + col,
            Self::Diagonal => i * side + i,
            Self::AntiDiagonal => i * side + (side - 1 - i),
        })
    }

    #[must_use]
    pub const fn covers(self, index: CellIndex, side: usize) -> bool {
        if side == 0 || index >= side * side {
            return false;
        }
        let (row, col) = (index / side, index % side);
        match self {
            Self::Row(r) => row == r,
            Self::Column(c) => col == c,
            Self::Diagonal => row == col,
            Self::AntiDiagonal => row + col == side - 1,
        }
    }

    #[must_use]
    pub fn is_complete(self, marked: &MarkedSet) -> bool {
        let side = marked.layout().side();
        self.fits(side) && self.cells(side).all(|index| marked.contains(index))
    }
}

/// Every line fully covered by the marked set, in tie-break order.
#[must_use]
pub fn detect(marked: &MarkedSet) -> Vec<Line> {
    Line::all(marked.layout().side())
        .filter(|line| line.is_complete(marked))
        .collect()
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(i) => write!(f, "row:{i}"),
            Self::Column(j) => write!(f, "col:{j}"),
            Self::Diagonal => f.write_str("diag:1"),
            Self::AntiDiagonal => f.write_str("diag:2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised line tag '{0}'")]
pub struct ParseLineError(pub String);

impl FromStr for Line {
    type Err = ParseLineError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let err = || ParseLineError(tag.to_string());
        let (kind, value) = tag.trim().split_once(':').ok_or_else(err)?;
        match kind {
            "row" => value.parse().map(Self::Row).map_err(|_| err()),
            "col" => value.parse().map(Self::Column).map_err(|_| err()),
            "diag" => match value {
                "1" => Ok(Self::Diagonal),
                "2" => Ok(Self::AntiDiagonal),
                _ => Err(err()),
            },
            _ => Err(err()),
        }
    }
}

impl Serialize for Line {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Line {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}
