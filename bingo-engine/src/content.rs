//! Default card text and forfeits seeded on first run.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grid::{CardLabels, GridLayout};
use crate::profile::ProfileId;
use crate::rewards::RewardList;

const DEFAULT_CONTENT_DATA: &str = include_str!("../assets/defaults.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DefaultContent {
    /// Card labels keyed by profile id, row-major.
    #[serde(default)]
    pub cards: BTreeMap<ProfileId, Vec<String>>,
    #[serde(default)]
    pub rewards: Vec<String>,
}

impl DefaultContent {
    /// Content bundled with the crate.
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_CONTENT_DATA).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into default content.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Labels for a profile's fresh card. Falls back to a generated card when
    /// the profile has no entry or its entry does not fit the layout.
    #[must_use]
    pub fn card_for(&self, id: &str, layout: &GridLayout) -> CardLabels {
        match self.cards.get(id) {
            Some(labels) => CardLabels::new(layout, labels.clone()).unwrap_or_else(|err| {
                log::warn!("default card for '{id}' ignored: {err}");
                CardLabels::generated(layout)
            }),
            None => CardLabels::generated(layout),
        }
    }

    /// Seed reward list. Empty when the content carries no rewards.
    #[must_use]
    pub fn reward_list(&self) -> RewardList {
        RewardList::from_stored(self.rewards.clone())
    }
}
