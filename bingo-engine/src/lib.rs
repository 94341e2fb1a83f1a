//! Bingo Card Engine
//!
//! Platform-agnostic core logic for a two-player grid-completion card game.
//! This crate tracks marked cells, detects completed rows, columns and
//! diagonals, rotates forfeits per completed line and sequences the
//! acknowledgement and celebration overlays. It performs no rendering;
//! hosts consume [`EngineEvent`]s and persist through [`CardStorage`].

pub mod config;
pub mod constants;
pub mod content;
#[cfg(feature = "async")]
pub mod driver;
pub mod engine;
pub mod error;
pub mod event;
pub mod grid;
pub mod ledger;
pub mod line;
pub mod notify;
pub mod profile;
pub mod rewards;
pub mod snapshot;
pub mod timer;

// Re-export commonly used types
pub use config::EngineConfig;
pub use constants::{FREE_SPACE_LABEL, NO_REWARD_CONFIGURED, PROFILE_KEY_PREFIX, REWARDS_KEY};
pub use content::DefaultContent;
#[cfg(feature = "async")]
pub use driver::{settle, sleep_until_due};
pub use engine::{BingoEngine, ToggleOutcome};
pub use error::{EngineError, IndexRejection, Result};
pub use event::{EngineEvent, NotificationPayload};
pub use grid::{CardLabels, CellIndex, GridLayout, MarkedSet};
pub use ledger::{CompletionLedger, NewLines};
pub use line::{Line, ParseLineError, detect};
pub use notify::{
    Celebration, CloseCause, NotificationKind, NotificationSequencer, NotificationState,
    NotificationTimings, SequencerEvent,
};
pub use profile::{MarkOutcome, PlayerProfile, ProfileId, UnmarkOutcome};
pub use rewards::{RewardCursor, RewardList};
pub use snapshot::{CardStorage, MemoryStorage, ProfileSnapshot, RewardsSnapshot, profile_key};
pub use timer::{Clock, ManualClock, Millis, Scheduler, SystemClock, TimerKind};
