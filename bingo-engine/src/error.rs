//! Error kinds surfaced by the card engine.
use thiserror::Error;

/// Why a cell index was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRejection {
    /// Index lies outside `0..cells`.
    OutOfRange { cells: usize },
    /// Index is the permanently marked free cell.
    FreeCell,
}

impl std::fmt::Display for IndexRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { cells } => write!(f, "outside a card of {cells} cells"),
            Self::FreeCell => write!(f, "the free cell cannot be toggled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid cell index {index}: {reason}")]
    InvalidIndex {
        index: usize,
        reason: IndexRejection,
    },
    #[error("reward list is empty")]
    EmptyRewardList,
    #[error("card needs {expected} labels (got {actual})")]
    LabelCountMismatch { expected: usize, actual: usize },
    #[error("invalid grid: side {side} with free cell {free_index}")]
    InvalidGrid { side: usize, free_index: usize },
    #[error("unknown player profile '{0}'")]
    UnknownProfile(String),
    #[error("snapshot '{key}' is corrupt: {reason}")]
    CorruptSnapshot { key: String, reason: String },
    #[error("no unmark is awaiting confirmation")]
    NoPendingUnmark,
}

impl EngineError {
    /// True for the out-of-range and free-cell rejections.
    #[must_use]
    pub const fn is_invalid_index(&self) -> bool {
        matches!(self, Self::InvalidIndex { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_index() {
        let err = EngineError::InvalidIndex {
            index: 31,
            reason: IndexRejection::OutOfRange { cells: 25 },
        };
        assert_eq!(
            err.to_string(),
            "invalid cell index 31: outside a card of 25 cells"
        );
        assert!(err.is_invalid_index());
        assert!(!EngineError::EmptyRewardList.is_invalid_index());
    }
}
