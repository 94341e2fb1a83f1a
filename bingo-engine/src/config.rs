//! Engine configuration.
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_GRID_SIDE;
use crate::error::Result;
use crate::grid::{CellIndex, GridLayout};
use crate::notify::NotificationTimings;
use crate::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_grid_side")]
    pub grid_side: usize,
    /// Free cell index; the middle cell when absent.
    #[serde(default)]
    pub free_index: Option<CellIndex>,
    #[serde(default)]
    pub timings: NotificationTimings,
    /// Profiles loaded (or seeded) when the engine opens, in display order.
    #[serde(default = "default_profiles")]
    pub profiles: Vec<ProfileId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_side: default_grid_side(),
            free_index: None,
            timings: NotificationTimings::default(),
            profiles: default_profiles(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a configuration.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn with_profiles<I, P>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProfileId>,
    {
        self.profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_grid(mut self, side: usize, free_index: Option<CellIndex>) -> Self {
        self.grid_side = side;
        self.free_index = free_index;
        self
    }

    #[must_use]
    pub const fn with_timings(mut self, timings: NotificationTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Card geometry described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidGrid`] for a zero side or a free
    /// cell outside the card.
    pub fn layout(&self) -> Result<GridLayout> {
        match self.free_index {
            Some(free_index) => GridLayout::new(self.grid_side, free_index),
            None => GridLayout::centred(self.grid_side),
        }
    }
}

const fn default_grid_side() -> usize {
    DEFAULT_GRID_SIDE
}

fn default_profiles() -> Vec<ProfileId> {
    vec!["Martyn".to_string(), "Sarah".to_string()]
}
