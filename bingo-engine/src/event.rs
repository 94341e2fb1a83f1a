//! Events handed to the host renderer.
//!
//! The engine never draws anything. Every visible change is described by an
//! event queued on the engine and collected by the host with
//! [`crate::BingoEngine::drain_events`].
use serde::{Deserialize, Serialize};

use crate::grid::CellIndex;
use crate::line::Line;
use crate::notify::NotificationKind;
use crate::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    CellMarked {
        profile_id: ProfileId,
        index: CellIndex,
    },
    CellUnmarked {
        profile_id: ProfileId,
        index: CellIndex,
        /// Awarded lines that became incomplete and can pay out again.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        reopened: Vec<Line>,
    },
    LineCompleted {
        profile_id: ProfileId,
        lines: Vec<Line>,
        /// Reward at the committed cursor after this completion.
        new_cursor_reward: String,
    },
    NotificationStateChanged {
        profile_id: ProfileId,
        state: NotificationKind,
        payload: NotificationPayload,
    },
    /// Non-fatal problem the host should surface (bad snapshot, empty reward
    /// list, storage failure).
    Warning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_id: Option<ProfileId>,
        message: String,
    },
}

impl EngineEvent {
    #[must_use]
    pub fn profile_id(&self) -> Option<&str> {
        match self {
            Self::CellMarked { profile_id, .. }
            | Self::CellUnmarked { profile_id, .. }
            | Self::LineCompleted { profile_id, .. }
            | Self::NotificationStateChanged { profile_id, .. } => Some(profile_id),
            Self::Warning { profile_id, .. } => profile_id.as_deref(),
        }
    }
}

/// What an overlay shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    None,
    Ack {
        index: CellIndex,
        label: String,
    },
    Celebration {
        lines: Vec<Line>,
        /// Forfeits owed for these lines, starting at the reward currently on
        /// display.
        rewards: Vec<String>,
    },
}
