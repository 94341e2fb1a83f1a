//! Persistence boundary: serializable snapshots and the storage trait.
//!
//! Storage is a plain key/value store of JSON strings, the same shape as a
//! browser's local storage. Every field of a snapshot is optional on read so
//! older or partial records load with defaults.
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::constants::PROFILE_KEY_PREFIX;
use crate::error::{EngineError, Result};
use crate::grid::{CardLabels, CellIndex, GridLayout, MarkedSet};
use crate::ledger::CompletionLedger;
use crate::line::Line;
use crate::profile::PlayerProfile;
use crate::rewards::{RewardCursor, RewardList};

/// Persisted state of one player's card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    #[serde(default)]
    pub grid_labels: Vec<String>,
    #[serde(default)]
    pub marked_indices: BTreeSet<CellIndex>,
    #[serde(default)]
    pub completed_lines: BTreeSet<Line>,
    #[serde(default)]
    pub reward_cursor: usize,
}

/// Persisted reward text shared by every profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsSnapshot {
    #[serde(default)]
    pub reward_list: Vec<String>,
}

impl RewardsSnapshot {
    #[must_use]
    pub fn capture(list: &RewardList) -> Self {
        Self {
            reward_list: list.as_slice().to_vec(),
        }
    }

    /// Stored text, or `None` when the record carries no list at all.
    #[must_use]
    pub fn into_list(self) -> Option<RewardList> {
        if self.reward_list.is_empty() {
            None
        } else {
            Some(RewardList::from_stored(self.reward_list))
        }
    }
}

impl ProfileSnapshot {
    /// Rebuild a profile, validating the record against the card layout.
    ///
    /// Missing labels fall back to `default_labels`, a missing free cell is
    /// put back, and awarded lines that are no longer complete are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorruptSnapshot`] when the labels do not match
    /// the card size, a marked index lies outside the card, or an awarded line
    /// does not exist on the card.
    pub fn restore(
        self,
        id: &str,
        layout: GridLayout,
        default_labels: &CardLabels,
        rewards_len: usize,
    ) -> Result<PlayerProfile> {
        let key = profile_key(id);
        let corrupt = |reason: String| EngineError::CorruptSnapshot {
            key: key.clone(),
            reason,
        };

        let labels = if self.grid_labels.is_empty() {
            default_labels.clone()
        } else {
            CardLabels::new(&layout, self.grid_labels).map_err(|err| corrupt(err.to_string()))?
        };
        let marked = MarkedSet::from_indices(layout, self.marked_indices)
            .map_err(|err| corrupt(err.to_string()))?;

        let side = layout.side();
        if let Some(line) = self.completed_lines.iter().find(|line| !line.fits(side)) {
            return Err(corrupt(format!(
                "line {line} does not exist on a {side}x{side} card"
            )));
        }
        let mut ledger = CompletionLedger::from_lines(self.completed_lines);
        let dropped = ledger.retain_complete(&marked);
        if dropped > 0 {
            log::debug!("dropped {dropped} stale awarded line(s) from {key}");
        }

        let mut cursor = RewardCursor::at(self.reward_cursor);
        cursor.normalize(rewards_len, 0);

        Ok(PlayerProfile::from_parts(
            id.to_string(),
            labels,
            marked,
            ledger,
            cursor,
        ))
    }
}

#[must_use]
pub fn profile_key(id: &str) -> String {
    format!("{PROFILE_KEY_PREFIX}{id}")
}

/// Parse a stored JSON record.
///
/// # Errors
///
/// Returns [`EngineError::CorruptSnapshot`] when `raw` is not valid JSON for
/// `T`.
pub fn decode<T>(key: &str, raw: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(raw).map_err(|err| EngineError::CorruptSnapshot {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

/// Trait for abstracting snapshot storage.
/// Platform-specific implementations should provide this.
pub trait CardStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read a stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn read(&self, key: &str) -> std::result::Result<Option<String>, Self::Error>;

    /// Store a record, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn write(&self, key: &str, value: &str) -> std::result::Result<(), Self::Error>;

    /// Delete a record. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    fn remove(&self, key: &str) -> std::result::Result<(), Self::Error>;
}

/// In-process storage. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.records.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.records.borrow_mut().insert(key.into(), value.into());
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.records.borrow().keys().cloned().collect()
    }
}

impl CardStorage for MemoryStorage {
    type Error = Infallible;

    fn read(&self, key: &str) -> std::result::Result<Option<String>, Self::Error> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> std::result::Result<(), Self::Error> {
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> std::result::Result<(), Self::Error> {
        self.records.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> GridLayout {
        GridLayout::centred(3).unwrap()
    }

    #[test]
    fn missing_keys_load_as_defaults() {
        let snapshot: ProfileSnapshot = decode("k", "{}").unwrap();
        assert_eq!(snapshot, ProfileSnapshot::default());

        let defaults = CardLabels::generated(&layout());
        let profile = snapshot.restore("p", layout(), &defaults, 6).unwrap();
        assert_eq!(profile.labels(), &defaults);
        assert_eq!(profile.score(), 1);
        assert!(profile.ledger().is_empty());
    }

    #[test]
    fn wire_format_uses_line_tags() {
        let snapshot = ProfileSnapshot {
            grid_labels: Vec::new(),
            marked_indices: BTreeSet::from([0, 1, 2, 4]),
            completed_lines: BTreeSet::from([Line::Row(0)]),
            reward_cursor: 1,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"gridLabels":[],"markedIndices":[0,1,2,4],"completedLines":["row:0"],"rewardCursor":1}"#
        );
    }

    #[test]
    fn restore_repairs_and_prunes() {
        let snapshot = ProfileSnapshot {
            grid_labels: Vec::new(),
            marked_indices: BTreeSet::from([0, 1, 2]),
            completed_lines: BTreeSet::from([Line::Row(0), Line::Column(0)]),
            reward_cursor: 8,
        };
        let defaults = CardLabels::generated(&layout());
        let profile = snapshot.restore("p", layout(), &defaults, 6).unwrap();
        assert!(profile.is_marked(4));
        assert_eq!(profile.ledger().iter().collect::<Vec<_>>(), vec![Line::Row(0)]);
        assert_eq!(profile.cursor().committed(), 2);
        assert_eq!(profile.cursor().revealed(), 2);
    }

    #[test]
    fn restore_rejects_shapes_that_do_not_fit() {
        let defaults = CardLabels::generated(&layout());
        let wrong_labels = ProfileSnapshot {
            grid_labels: vec!["a".into(); 4],
            ..ProfileSnapshot::default()
        };
        assert!(matches!(
            wrong_labels.restore("p", layout(), &defaults, 1),
            Err(EngineError::CorruptSnapshot { .. })
        ));

        let wrong_index = ProfileSnapshot {
            marked_indices: BTreeSet::from([9]),
            ..ProfileSnapshot::default()
        };
        assert!(wrong_index.restore("p", layout(), &defaults, 1).is_err());

        let wrong_line = ProfileSnapshot {
            completed_lines: BTreeSet::from([Line::Row(3)]),
            ..ProfileSnapshot::default()
        };
        let err = wrong_line.restore("p", layout(), &defaults, 1).unwrap_err();
        assert_eq!(
            err,
            EngineError::CorruptSnapshot {
                key: "bingo.profile.p".into(),
                reason: "line row:3 does not exist on a 3x3 card".into()
            }
        );
    }

    #[test]
    fn malformed_json_is_corrupt() {
        let err = decode::<ProfileSnapshot>("bingo.profile.x", "{not json").unwrap_err();
        assert!(matches!(err, EngineError::CorruptSnapshot { ref key, .. } if key == "bingo.profile.x"));
        assert!(decode::<ProfileSnapshot>("k", r#"{"completedLines":["r0"]}"#).is_err());
    }

    #[test]
    fn memory_storage_clones_share_records() {
        let storage = MemoryStorage::new();
        let view = storage.clone();
        storage.write("a", "1").unwrap();
        assert_eq!(view.read("a").unwrap().as_deref(), Some("1"));
        view.remove("a").unwrap();
        assert!(storage.read("a").unwrap().is_none());
    }

    #[test]
    fn rewards_snapshot_without_list_yields_none() {
        assert!(RewardsSnapshot::default().into_list().is_none());
        let list = RewardList::new(vec!["x".into()]).unwrap();
        assert_eq!(RewardsSnapshot::capture(&list).into_list(), Some(list));
    }
}
