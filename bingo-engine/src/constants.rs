//! Centralized constants for the card engine.
//!
//! Timings and storage keys live here so that behavior changes go through
//! code review instead of drifting inside host code.

// Card content -------------------------------------------------------------
pub const DEFAULT_GRID_SIDE: usize = 5;
pub const FREE_SPACE_LABEL: &str = "FREE SPACE";
pub(crate) const GENERATED_LABEL_PREFIX: &str = "Spot";
pub const NO_REWARD_CONFIGURED: &str = "no reward configured";

// Overlay timings (milliseconds) -------------------------------------------
pub const DEFAULT_ACK_MS: u64 = 2_000;
pub const DEFAULT_CELEBRATION_GAP_MS: u64 = 500;
pub const DEFAULT_CELEBRATION_MS: u64 = 5_000;

// Storage keys --------------------------------------------------------------
pub const REWARDS_KEY: &str = "bingo.rewards";
pub const PROFILE_KEY_PREFIX: &str = "bingo.profile.";
