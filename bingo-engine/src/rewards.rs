//! Forfeit rotation.
//!
//! The reward text is shared between players while each player keeps a
//! cursor of their own. A cursor has two positions: `committed` moves as soon
//! as lines complete, `revealed` catches up when the celebration overlay for
//! those lines closes. Hosts display `revealed`.
use serde::{Deserialize, Serialize};

use crate::constants::NO_REWARD_CONFIGURED;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardList {
    rewards: Vec<String>,
}

impl RewardList {
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyRewardList`] when `rewards` is empty.
    pub fn new(rewards: Vec<String>) -> Result<Self> {
        if rewards.is_empty() {
            return Err(EngineError::EmptyRewardList);
        }
        Ok(Self { rewards })
    }

    /// Wrap stored text without validation. An empty list is tolerated here so
    /// a bad snapshot degrades to the "no reward" sentinel instead of failing.
    #[must_use]
    pub(crate) fn from_stored(rewards: Vec<String>) -> Self {
        Self { rewards }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.rewards
    }

    /// Reward at `position`, wrapping around the list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyRewardList`] for an empty list.
    pub fn get(&self, position: usize) -> Result<&str> {
        if self.rewards.is_empty() {
            return Err(EngineError::EmptyRewardList);
        }
        Ok(&self.rewards[position % self.rewards.len()])
    }

    #[must_use]
    pub fn get_or_sentinel(&self, position: usize) -> &str {
        self.get(position).unwrap_or(NO_REWARD_CONFIGURED)
    }

    /// `count` consecutive rewards starting at `position`, wrapping.
    #[must_use]
    pub fn window(&self, position: usize, count: usize) -> Vec<String> {
        (0..count)
            .map(|offset| self.get_or_sentinel(position.wrapping_add(offset)).to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCursor {
    committed: usize,
    revealed: usize,
}

impl RewardCursor {
    /// Cursor resting at `position` with nothing pending.
    #[must_use]
    pub const fn at(position: usize) -> Self {
        Self {
            committed: position,
            revealed: position,
        }
    }

    #[must_use]
    pub const fn committed(&self) -> usize {
        self.committed
    }

    #[must_use]
    pub const fn revealed(&self) -> usize {
        self.revealed
    }

    /// Move the committed position by `count`, one step per completed line.
    pub fn advance(&mut self, count: usize, len: usize) {
        self.committed = step(self.committed, count, len);
    }

    /// Move the visible position by `count` once its celebration closes.
    pub fn reveal(&mut self, count: usize, len: usize) {
        self.revealed = step(self.revealed, count, len);
    }

    /// Steps the visible position still has to catch up.
    #[must_use]
    pub const fn pending(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.committed + len - self.revealed % len) % len
    }

    /// Clamp into a list of a new length. `owed` is the number of reveals
    /// still to come from open celebrations; `revealed` is placed that many
    /// steps behind `committed` so those reveals land on it exactly.
    pub fn normalize(&mut self, len: usize, owed: usize) {
        if len == 0 {
            self.committed = 0;
            self.revealed = 0;
        } else {
            self.committed %= len;
            self.revealed = (self.committed + len - owed % len) % len;
        }
    }

    /// Reward at the committed position.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyRewardList`] for an empty list.
    pub fn current<'a>(&self, list: &'a RewardList) -> Result<&'a str> {
        list.get(self.committed)
    }

    /// Reward the player currently sees.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyRewardList`] for an empty list.
    pub fn visible<'a>(&self, list: &'a RewardList) -> Result<&'a str> {
        list.get(self.revealed)
    }
}

const fn step(position: usize, count: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (position % len + count % len) % len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn six() -> RewardList {
        RewardList::new((1..=6).map(|i| format!("forfeit {i}")).collect()).unwrap()
    }

    #[test]
    fn empty_lists_are_rejected_and_degrade_to_sentinel() {
        assert_eq!(RewardList::new(Vec::new()), Err(EngineError::EmptyRewardList));
        let stored = RewardList::from_stored(Vec::new());
        assert_eq!(stored.get(3), Err(EngineError::EmptyRewardList));
        assert_eq!(stored.get_or_sentinel(3), NO_REWARD_CONFIGURED);
        assert_eq!(RewardCursor::at(0).current(&stored), Err(EngineError::EmptyRewardList));
    }

    #[test]
    fn advance_wraps_once_per_line() {
        let list = six();
        let mut cursor = RewardCursor::at(5);
        cursor.advance(2, list.len());
        assert_eq!(cursor.committed(), 1);
        assert_eq!(cursor.current(&list).unwrap(), "forfeit 2");
        assert_eq!(cursor.visible(&list).unwrap(), "forfeit 6");
        assert_eq!(cursor.pending(list.len()), 2);

        cursor.reveal(2, list.len());
        assert_eq!(cursor.revealed(), 1);
        assert_eq!(cursor.pending(list.len()), 0);
    }

    #[test]
    fn normalize_follows_a_shorter_list() {
        let mut cursor = RewardCursor::at(5);
        cursor.normalize(4, 0);
        assert_eq!(cursor, RewardCursor::at(1));
        cursor.normalize(0, 0);
        assert_eq!(cursor, RewardCursor::at(0));
    }

    #[test]
    fn normalize_keeps_owed_reveals() {
        let mut cursor = RewardCursor::at(5);
        cursor.advance(2, 6);
        assert_eq!((cursor.committed(), cursor.revealed()), (1, 5));

        cursor.normalize(4, 2);
        assert_eq!(cursor.committed(), 1);
        assert_eq!(cursor.pending(4), 2);
        cursor.reveal(2, 4);
        assert_eq!(cursor.revealed(), cursor.committed());

        // more owed steps than the new list has entries
        let mut cursor = RewardCursor::at(0);
        cursor.advance(4, 6);
        cursor.normalize(3, 4);
        cursor.reveal(4, 3);
        assert_eq!(cursor.revealed(), cursor.committed());
    }

    #[test]
    fn window_lists_owed_rewards() {
        let list = six();
        assert_eq!(list.window(5, 2), vec!["forfeit 6", "forfeit 1"]);
        assert!(list.window(0, 0).is_empty());
    }
}
