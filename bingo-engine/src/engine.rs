//! Host-facing facade tying cards, rewards, overlays and storage together.
use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::constants::{NO_REWARD_CONFIGURED, REWARDS_KEY};
use crate::content::DefaultContent;
use crate::error::{EngineError, Result};
use crate::event::{EngineEvent, NotificationPayload};
use crate::grid::{CellIndex, GridLayout};
use crate::notify::{NotificationSequencer, NotificationState, SequencerEvent};
use crate::profile::{MarkOutcome, PlayerProfile, ProfileId, UnmarkOutcome};
use crate::rewards::RewardList;
use crate::snapshot::{CardStorage, ProfileSnapshot, RewardsSnapshot, decode, profile_key};
use crate::timer::{Clock, Millis};

/// Result of tapping a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Marked(MarkOutcome),
    /// The cell is already marked; the host should ask before unmarking it
    /// with [`BingoEngine::confirm_unmark`].
    ConfirmUnmark { index: CellIndex },
}

#[derive(Debug, Clone)]
struct ProfileSlot {
    profile: PlayerProfile,
    sequencer: NotificationSequencer,
    pending_unmark: Option<CellIndex>,
}

enum Stored<T> {
    Found(T),
    Missing,
    /// Unusable record; defaults are seeded over it.
    Corrupt,
    /// The store itself failed; defaults are used but nothing is written at
    /// open. The next mutation of that record still persists over it.
    Unavailable,
}

/// Card engine for every configured player.
///
/// All mutating calls fire notification timers that are already due before
/// applying their own change, and persist the affected records afterwards.
/// Queries take `&self` and so see timers only as of the last call; hosts
/// call [`BingoEngine::poll`] when a deadline passes.
pub struct BingoEngine<S, C>
where
    S: CardStorage,
    C: Clock,
{
    config: EngineConfig,
    layout: GridLayout,
    content: DefaultContent,
    storage: S,
    clock: C,
    rewards: RewardList,
    slots: BTreeMap<ProfileId, ProfileSlot>,
    order: Vec<ProfileId>,
    events: Vec<EngineEvent>,
}

impl<S, C> BingoEngine<S, C>
where
    S: CardStorage,
    C: Clock,
{
    /// Load (or seed) the reward list and every configured profile using the
    /// bundled default content.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidGrid`] when the configured grid is not
    /// usable. Bad stored records never fail here; they are replaced by
    /// defaults and reported as warnings.
    pub fn open(config: EngineConfig, storage: S, clock: C) -> Result<Self> {
        Self::open_with_content(config, DefaultContent::load_from_static(), storage, clock)
    }

    /// Like [`BingoEngine::open`] with caller-provided default content.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidGrid`] when the configured grid is not
    /// usable.
    pub fn open_with_content(
        config: EngineConfig,
        content: DefaultContent,
        storage: S,
        clock: C,
    ) -> Result<Self> {
        let layout = config.layout()?;
        let mut engine = Self {
            config,
            layout,
            content,
            storage,
            clock,
            rewards: RewardList::default(),
            slots: BTreeMap::new(),
            order: Vec::new(),
            events: Vec::new(),
        };
        engine.load_rewards();
        let ids = engine.config.profiles.clone();
        for id in ids {
            if engine.slots.contains_key(&id) {
                log::warn!("profile '{id}' configured twice; ignoring the duplicate");
                continue;
            }
            engine.load_profile(id);
        }
        log::info!(
            "bingo engine ready: {} profile(s), {}x{} card, {} reward(s)",
            engine.order.len(),
            engine.layout.side(),
            engine.layout.side(),
            engine.rewards.len()
        );
        Ok(engine)
    }

    fn load_rewards(&mut self) {
        let stored = match self.read_record::<RewardsSnapshot>(REWARDS_KEY, None) {
            Stored::Found(snapshot) => snapshot.into_list().map_or(Stored::Missing, Stored::Found),
            Stored::Missing => Stored::Missing,
            Stored::Corrupt => Stored::Corrupt,
            Stored::Unavailable => Stored::Unavailable,
        };
        match stored {
            Stored::Found(list) => self.rewards = list,
            Stored::Missing | Stored::Corrupt => {
                self.rewards = self.content.reward_list();
                if !self.rewards.is_empty() {
                    self.persist_rewards();
                }
            }
            Stored::Unavailable => self.rewards = self.content.reward_list(),
        }
        if self.rewards.is_empty() {
            self.warn(
                None,
                format!("reward list is empty; showing '{NO_REWARD_CONFIGURED}'"),
            );
        }
    }

    fn load_profile(&mut self, id: ProfileId) {
        let key = profile_key(&id);
        let defaults = self.content.card_for(&id, &self.layout);
        let (profile, seed) = match self.read_record::<ProfileSnapshot>(&key, Some(&id)) {
            Stored::Found(snapshot) => {
                match snapshot.restore(&id, self.layout, &defaults, self.rewards.len()) {
                    Ok(profile) => (profile, false),
                    Err(err) => {
                        self.warn(Some(&id), format!("{err}; starting a fresh card"));
                        (PlayerProfile::new(id.clone(), self.layout, defaults), true)
                    }
                }
            }
            Stored::Missing | Stored::Corrupt => {
                (PlayerProfile::new(id.clone(), self.layout, defaults), true)
            }
            Stored::Unavailable => (PlayerProfile::new(id.clone(), self.layout, defaults), false),
        };
        log::debug!("loaded profile '{id}' with score {}", profile.score());
        self.slots.insert(
            id.clone(),
            ProfileSlot {
                profile,
                sequencer: NotificationSequencer::new(self.config.timings),
                pending_unmark: None,
            },
        );
        self.order.push(id.clone());
        if seed {
            self.persist_profile(&id);
        }
    }

    fn read_record<T>(&mut self, key: &str, profile_id: Option<&str>) -> Stored<T>
    where
        T: DeserializeOwned,
    {
        match self.storage.read(key) {
            Ok(Some(raw)) => match decode::<T>(key, &raw) {
                Ok(record) => Stored::Found(record),
                Err(err) => {
                    self.warn(profile_id, format!("{err}; restoring defaults"));
                    Stored::Corrupt
                }
            },
            Ok(None) => Stored::Missing,
            Err(err) => {
                self.warn(profile_id, format!("could not read {key}: {err}"));
                Stored::Unavailable
            }
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn layout(&self) -> &GridLayout {
        &self.layout
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Profile ids in configured order.
    #[must_use]
    pub fn profile_ids(&self) -> &[ProfileId] {
        &self.order
    }

    #[must_use]
    pub fn profile(&self, profile_id: &str) -> Option<&PlayerProfile> {
        self.slots.get(profile_id).map(|slot| &slot.profile)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] for an unknown id.
    pub fn score(&self, profile_id: &str) -> Result<usize> {
        Ok(self.slot(profile_id)?.profile.score())
    }

    /// Reward the player currently sees. The committed cursor may already be
    /// ahead while a celebration is queued or on screen.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] for an unknown id.
    pub fn current_reward(&self, profile_id: &str) -> Result<&str> {
        let cursor = self.slot(profile_id)?.profile.cursor();
        Ok(self.rewards.get_or_sentinel(cursor.revealed()))
    }

    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] for an unknown id.
    pub fn notification_state(&self, profile_id: &str) -> Result<&NotificationState> {
        Ok(self.slot(profile_id)?.sequencer.state())
    }

    #[must_use]
    pub const fn reward_list(&self) -> &RewardList {
        &self.rewards
    }

    #[must_use]
    pub fn pending_unmark(&self, profile_id: &str) -> Option<CellIndex> {
        self.slots.get(profile_id).and_then(|slot| slot.pending_unmark)
    }

    /// Earliest pending overlay deadline across all profiles.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Millis> {
        self.slots
            .values()
            .filter_map(|slot| slot.sequencer.next_deadline())
            .min()
    }

    /// Hand queued events to the host, oldest first.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Fire every overlay timer that is due and return the next deadline.
    pub fn poll(&mut self) -> Option<Millis> {
        self.fire_due();
        self.next_deadline()
    }

    /// Mark a cell, award newly completed lines and start the overlays.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] or
    /// [`EngineError::InvalidIndex`]; nothing changes in either case.
    pub fn mark_cell(&mut self, profile_id: &str, index: CellIndex) -> Result<MarkOutcome> {
        let now = self.fire_due();
        let slot = slot_mut(&mut self.slots, profile_id)?;
        let outcome = slot.profile.mark_cell(index, &self.rewards)?;
        if !outcome.has_update() {
            return Ok(outcome);
        }
        if slot.pending_unmark == Some(index) {
            slot.pending_unmark = None;
        }
        log::debug!("'{profile_id}' marked cell {index}");
        self.events.push(EngineEvent::CellMarked {
            profile_id: profile_id.to_string(),
            index,
        });

        let lines = outcome.newly_completed();
        if !lines.is_empty() {
            let reward = self
                .rewards
                .get_or_sentinel(slot.profile.cursor().committed())
                .to_string();
            log::info!(
                "'{profile_id}' completed {} line(s); next forfeit '{reward}'",
                lines.len()
            );
            self.events.push(EngineEvent::LineCompleted {
                profile_id: profile_id.to_string(),
                lines: lines.to_vec(),
                new_cursor_reward: reward,
            });
        }

        let fired = slot.sequencer.on_cell_marked(index, now);
        slot.sequencer.queue_celebration(lines, now);
        relay(&mut slot.profile, &self.rewards, fired, &mut self.events);
        self.persist_profile(profile_id);
        Ok(outcome)
    }

    /// Unmark a cell straight away, reopening awarded lines through it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] or
    /// [`EngineError::InvalidIndex`].
    pub fn unmark_cell(&mut self, profile_id: &str, index: CellIndex) -> Result<UnmarkOutcome> {
        self.fire_due();
        let slot = slot_mut(&mut self.slots, profile_id)?;
        let outcome = slot.profile.unmark_cell(index)?;
        if !outcome.has_update() {
            return Ok(outcome);
        }
        slot.pending_unmark = None;
        let reopened = match &outcome {
            UnmarkOutcome::Unmarked { reopened } => reopened.to_vec(),
            UnmarkOutcome::NotMarked => Vec::new(),
        };
        log::debug!(
            "'{profile_id}' unmarked cell {index}, reopening {} line(s)",
            reopened.len()
        );
        self.events.push(EngineEvent::CellUnmarked {
            profile_id: profile_id.to_string(),
            index,
            reopened,
        });
        self.persist_profile(profile_id);
        Ok(outcome)
    }

    /// Tap a cell: marks an unmarked cell, asks for confirmation on a
    /// marked one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] or
    /// [`EngineError::InvalidIndex`].
    pub fn toggle_cell(&mut self, profile_id: &str, index: CellIndex) -> Result<ToggleOutcome> {
        if self.request_unmark(profile_id, index)? {
            Ok(ToggleOutcome::ConfirmUnmark { index })
        } else {
            self.mark_cell(profile_id, index).map(ToggleOutcome::Marked)
        }
    }

    /// Hold an unmark until the player confirms it. Any earlier hold is
    /// replaced; when the cell is not marked it is dropped and `false`
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] or
    /// [`EngineError::InvalidIndex`].
    pub fn request_unmark(&mut self, profile_id: &str, index: CellIndex) -> Result<bool> {
        self.fire_due();
        let slot = slot_mut(&mut self.slots, profile_id)?;
        self.layout.check_markable(index)?;
        if !slot.profile.is_marked(index) {
            slot.pending_unmark = None;
            return Ok(false);
        }
        slot.pending_unmark = Some(index);
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NoPendingUnmark`] when nothing awaits
    /// confirmation, or [`EngineError::UnknownProfile`].
    pub fn confirm_unmark(&mut self, profile_id: &str) -> Result<UnmarkOutcome> {
        let slot = slot_mut(&mut self.slots, profile_id)?;
        let index = slot.pending_unmark.take().ok_or(EngineError::NoPendingUnmark)?;
        self.unmark_cell(profile_id, index)
    }

    /// Drop a held unmark. Returns whether one was held.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] for an unknown id.
    pub fn cancel_unmark(&mut self, profile_id: &str) -> Result<bool> {
        let slot = slot_mut(&mut self.slots, profile_id)?;
        Ok(slot.pending_unmark.take().is_some())
    }

    /// Close whatever overlay is showing. Closing a celebration reveals the
    /// rewards it announced.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] for an unknown id.
    pub fn dismiss_notification(&mut self, profile_id: &str) -> Result<()> {
        let now = self.fire_due();
        let slot = slot_mut(&mut self.slots, profile_id)?;
        let fired = slot.sequencer.dismiss(now);
        relay(&mut slot.profile, &self.rewards, fired, &mut self.events);
        Ok(())
    }

    /// Replace the shared forfeit list. Every cursor is clamped into the new
    /// list, with the visible position kept behind by whatever open
    /// celebrations have yet to reveal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyRewardList`] for an empty list; the
    /// current list stays in place.
    pub fn set_reward_list(&mut self, rewards: Vec<String>) -> Result<()> {
        self.fire_due();
        self.rewards = RewardList::new(rewards)?;
        let len = self.rewards.len();
        for slot in self.slots.values_mut() {
            let owed = slot.sequencer.owed_reveals();
            slot.profile.normalize_cursor(len, owed);
        }
        log::info!("reward list replaced ({len} forfeit(s))");
        self.persist_rewards();
        for id in self.order.clone() {
            self.persist_profile(&id);
        }
        Ok(())
    }

    /// Replace one card's text. Marks and awards are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LabelCountMismatch`] unless there is exactly
    /// one label per cell, or [`EngineError::UnknownProfile`].
    pub fn set_grid_labels(&mut self, profile_id: &str, labels: Vec<String>) -> Result<()> {
        self.fire_due();
        let slot = slot_mut(&mut self.slots, profile_id)?;
        slot.profile.set_labels(labels)?;
        self.persist_profile(profile_id);
        Ok(())
    }

    /// Clear one card back to just the free cell with the cursor at the
    /// first forfeit. Card text and other profiles are kept.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProfile`] for an unknown id.
    pub fn reset_profile(&mut self, profile_id: &str) -> Result<()> {
        self.fire_due();
        let slot = slot_mut(&mut self.slots, profile_id)?;
        slot.profile.clear_progress();
        slot.pending_unmark = None;
        let fired = slot.sequencer.reset();
        relay(&mut slot.profile, &self.rewards, fired, &mut self.events);
        log::info!("'{profile_id}' reset");
        self.persist_profile(profile_id);
        Ok(())
    }

    fn fire_due(&mut self) -> Millis {
        let now = self.clock.now();
        for slot in self.slots.values_mut() {
            let fired = slot.sequencer.advance_to(now);
            relay(&mut slot.profile, &self.rewards, fired, &mut self.events);
        }
        now
    }

    fn slot(&self, profile_id: &str) -> Result<&ProfileSlot> {
        self.slots
            .get(profile_id)
            .ok_or_else(|| EngineError::UnknownProfile(profile_id.to_string()))
    }

    fn persist_profile(&mut self, profile_id: &str) {
        let Some(slot) = self.slots.get(profile_id) else {
            return;
        };
        let snapshot = slot.profile.snapshot();
        self.write_record(&profile_key(profile_id), &snapshot, Some(profile_id));
    }

    fn persist_rewards(&mut self) {
        let snapshot = RewardsSnapshot::capture(&self.rewards);
        self.write_record(REWARDS_KEY, &snapshot, None);
    }

    fn write_record<T>(&mut self, key: &str, record: &T, profile_id: Option<&str>)
    where
        T: Serialize,
    {
        let written = serde_json::to_string(record)
            .map_err(|err| err.to_string())
            .and_then(|json| {
                self.storage
                    .write(key, &json)
                    .map_err(|err| err.to_string())
            });
        if let Err(reason) = written {
            self.warn(profile_id, format!("could not persist {key}: {reason}"));
        }
    }

    fn warn(&mut self, profile_id: Option<&str>, message: String) {
        match profile_id {
            Some(id) => log::warn!("[{id}] {message}"),
            None => log::warn!("{message}"),
        }
        self.events.push(EngineEvent::Warning {
            profile_id: profile_id.map(str::to_string),
            message,
        });
    }
}

fn slot_mut<'a>(
    slots: &'a mut BTreeMap<ProfileId, ProfileSlot>,
    profile_id: &str,
) -> Result<&'a mut ProfileSlot> {
    slots
        .get_mut(profile_id)
        .ok_or_else(|| EngineError::UnknownProfile(profile_id.to_string()))
}

/// Translate sequencer output into host events. A closing celebration moves
/// the visible cursor by the lines it announced.
fn relay(
    profile: &mut PlayerProfile,
    rewards: &RewardList,
    fired: Vec<SequencerEvent>,
    events: &mut Vec<EngineEvent>,
) {
    for event in fired {
        match event {
            SequencerEvent::Changed(state) => {
                let payload = match &state {
                    NotificationState::Idle => NotificationPayload::None,
                    NotificationState::ShowingAck { index } => NotificationPayload::Ack {
                        index: *index,
                        label: profile.labels().get(*index).unwrap_or_default().to_string(),
                    },
                    NotificationState::ShowingCelebration(celebration) => {
                        NotificationPayload::Celebration {
                            lines: celebration.lines.clone(),
                            rewards: rewards
                                .window(profile.cursor().revealed(), celebration.advance()),
                        }
                    }
                };
                events.push(EngineEvent::NotificationStateChanged {
                    profile_id: profile.id().to_string(),
                    state: state.kind(),
                    payload,
                });
            }
            SequencerEvent::CelebrationClosed { celebration, cause } => {
                profile.reveal_rewards(celebration.advance(), rewards.len());
                log::info!(
                    "'{}' celebration closed ({cause:?}); showing '{}'",
                    profile.id(),
                    rewards.get_or_sentinel(profile.cursor().revealed())
                );
            }
        }
    }
}
