use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bingo_engine::{
    BingoEngine, CardStorage, CellIndex, Clock, EngineConfig, EngineError, EngineEvent, Line,
    ManualClock, MarkOutcome, MemoryStorage, Millis, NotificationKind, ProfileId, REWARDS_KEY,
    ToggleOutcome, UnmarkOutcome, detect, profile_key,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::storage::{FileStorage, ScenarioStorage};

pub type CardEngine = BingoEngine<ScenarioStorage, ManualClock>;

/// Upper bound on timer firings while settling, so a runaway schedule shows
/// up as a failure instead of a hang.
const MAX_SETTLE_FIRINGS: usize = 1_000;

/// One host action in a scripted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Mark { profile: ProfileId, index: CellIndex },
    Unmark { profile: ProfileId, index: CellIndex },
    Toggle { profile: ProfileId, index: CellIndex },
    ConfirmUnmark { profile: ProfileId },
    Dismiss { profile: ProfileId },
    /// Move the clock forward and fire due timers.
    Advance(Millis),
    /// Run the clock through every pending deadline.
    Settle,
    SetRewards(Vec<String>),
    SetLabels { profile: ProfileId, labels: Vec<String> },
    Reset { profile: ProfileId },
    /// Drop the engine and open a new one over the same storage.
    Reload,
    /// Seeded random marks, unmarks, dismissals, reward edits and clock moves.
    RandomPlay { profile: ProfileId, steps: usize },
    /// Named marker for expectations.
    Checkpoint(&'static str),
}

impl Step {
    pub fn mark(profile: &str, index: CellIndex) -> Self {
        Self::Mark {
            profile: profile.to_string(),
            index,
        }
    }

    pub fn unmark(profile: &str, index: CellIndex) -> Self {
        Self::Unmark {
            profile: profile.to_string(),
            index,
        }
    }

    pub fn toggle(profile: &str, index: CellIndex) -> Self {
        Self::Toggle {
            profile: profile.to_string(),
            index,
        }
    }

    pub fn confirm_unmark(profile: &str) -> Self {
        Self::ConfirmUnmark {
            profile: profile.to_string(),
        }
    }

    pub fn dismiss(profile: &str) -> Self {
        Self::Dismiss {
            profile: profile.to_string(),
        }
    }

    pub fn set_labels(profile: &str, labels: Vec<String>) -> Self {
        Self::SetLabels {
            profile: profile.to_string(),
            labels,
        }
    }

    pub fn reset(profile: &str) -> Self {
        Self::Reset {
            profile: profile.to_string(),
        }
    }

    pub fn random_play(profile: &str, steps: usize) -> Self {
        Self::RandomPlay {
            profile: profile.to_string(),
            steps,
        }
    }

    pub fn marks(profile: &str, indices: &[CellIndex]) -> Vec<Self> {
        indices.iter().map(|&index| Self::mark(profile, index)).collect()
    }
}

/// Assertion hook run after a plan completes.
type PlanExpectationFn = Arc<dyn Fn(&RunSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct PlanExpectation(PlanExpectationFn);

impl std::fmt::Debug for PlanExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExpectation").finish()
    }
}

impl PlanExpectation {
    pub fn evaluate(&self, summary: &RunSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for PlanExpectation
where
    F: Fn(&RunSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Engine configuration, pre-seeded storage records and a script of steps.
#[derive(Debug, Clone)]
pub struct CardPlan {
    pub config: EngineConfig,
    pub records: Vec<(String, String)>,
    pub steps: Vec<Step>,
    pub expectations: Vec<PlanExpectation>,
}

impl Default for CardPlan {
    fn default() -> Self {
        Self::new(EngineConfig::default_config())
    }
}

impl CardPlan {
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            steps: Vec::new(),
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_record(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.records.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn then_all(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<PlanExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Marked(MarkOutcome),
    Unmarked(UnmarkOutcome),
    Toggled(ToggleOutcome),
    Rejected(EngineError),
}

impl StepOutcome {
    pub const fn rejection(&self) -> Option<&EngineError> {
        match self {
            Self::Rejected(err) => Some(err),
            _ => None,
        }
    }

    pub fn newly_completed(&self) -> &[Line] {
        match self {
            Self::Marked(outcome) | Self::Toggled(ToggleOutcome::Marked(outcome)) => {
                outcome.newly_completed()
            }
            _ => &[],
        }
    }
}

/// What a host would render for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub id: ProfileId,
    pub score: usize,
    pub marked: Vec<CellIndex>,
    pub completed: Vec<Line>,
    pub committed: usize,
    pub revealed: usize,
    pub current_reward: String,
    pub notification: NotificationKind,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
    pub events: Vec<EngineEvent>,
    pub views: Vec<ProfileView>,
    pub clock_ms: Millis,
}

impl StepRecord {
    pub fn view(&self, id: &str) -> Result<&ProfileView> {
        find_view(&self.views, id)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub seed: u64,
    pub open_events: Vec<EngineEvent>,
    pub steps: Vec<StepRecord>,
    pub rewards: Vec<String>,
    pub records: BTreeMap<String, Option<String>>,
    pub violations: Vec<String>,
}

impl RunSummary {
    /// Final view of a profile.
    pub fn profile(&self, id: &str) -> Result<&ProfileView> {
        let views = self
            .steps
            .last()
            .map(|record| record.views.as_slice())
            .unwrap_or_default();
        find_view(views, id)
    }

    /// Record of the first checkpoint with this name.
    pub fn checkpoint(&self, name: &str) -> Result<&StepRecord> {
        self.steps
            .iter()
            .find(|record| matches!(record.step, Step::Checkpoint(label) if label == name))
            .with_context(|| format!("checkpoint '{name}' never reached"))
    }

    /// Every event emitted after the engine opened, in order.
    pub fn events(&self) -> impl Iterator<Item = &EngineEvent> {
        self.steps.iter().flat_map(|record| record.events.iter())
    }

    pub fn completions(&self, id: &str) -> Vec<Vec<Line>> {
        self.events()
            .filter_map(|event| match event {
                EngineEvent::LineCompleted {
                    profile_id, lines, ..
                } if profile_id == id => Some(lines.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self, id: &str) -> Vec<NotificationKind> {
        self.events()
            .filter_map(|event| match event {
                EngineEvent::NotificationStateChanged {
                    profile_id, state, ..
                } if profile_id == id => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn rejections(&self) -> Vec<&EngineError> {
        self.steps
            .iter()
            .filter_map(|record| record.outcome.rejection())
            .collect()
    }

    pub fn warnings(&self) -> Vec<&EngineEvent> {
        self.open_events
            .iter()
            .chain(self.events())
            .filter(|event| matches!(event, EngineEvent::Warning { .. }))
            .collect()
    }
}

fn find_view<'a>(views: &'a [ProfileView], id: &str) -> Result<&'a ProfileView> {
    views
        .iter()
        .find(|view| view.id == id)
        .with_context(|| format!("no profile '{id}' in the run"))
}

/// Headless deterministic runner for scripted card sessions.
#[derive(Debug, Clone, Default)]
pub struct CardTester {
    verbose: bool,
    state_dir: Option<PathBuf>,
}

impl CardTester {
    pub const fn new(verbose: bool) -> Self {
        Self {
            verbose,
            state_dir: None,
        }
    }

    /// Persist runs under `dir` (one subdirectory per run) instead of memory.
    #[must_use]
    pub fn with_state_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.state_dir = dir;
        self
    }

    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    fn storage_for(&self, label: &str, seed: u64) -> Result<ScenarioStorage> {
        match &self.state_dir {
            None => Ok(ScenarioStorage::Memory(MemoryStorage::new())),
            Some(dir) => {
                let run_dir = dir.join(format!("{}-{seed}", slug(label)));
                let files = FileStorage::fresh(&run_dir)
                    .with_context(|| format!("preparing {}", run_dir.display()))?;
                log::debug!("persisting '{label}' under {}", files.root().display());
                Ok(ScenarioStorage::Files(files))
            }
        }
    }

    pub fn run_plan(&self, plan: &CardPlan, label: &str, seed: u64) -> Result<RunSummary> {
        let storage = self.storage_for(label, seed)?;
        for (key, value) in &plan.records {
            storage
                .write(key, value)
                .with_context(|| format!("seeding record {key}"))?;
        }
        let clock = ManualClock::new(0);
        let mut engine = open_engine(plan, &storage, &clock)?;
        let open_events = engine.drain_events();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut violations = Vec::new();

        for (position, step) in plan.steps.iter().enumerate() {
            let before = capture_views(&engine);
            let mut found = Vec::new();
            let outcome = match step {
                Step::Reload => {
                    engine = open_engine(plan, &storage, &clock)?;
                    StepOutcome::Done
                }
                Step::Settle => {
                    found.extend(settle(&mut engine, &clock));
                    StepOutcome::Done
                }
                Step::RandomPlay { profile, steps } => {
                    found.extend(random_play(&mut engine, &clock, &mut rng, profile, *steps));
                    StepOutcome::Done
                }
                other => {
                    let outcome = apply(&mut engine, &clock, other);
                    found.extend(check_cursor_moves(&engine, &before, other, &outcome));
                    outcome
                }
            };
            found.extend(check_cards(&engine));
            if self.verbose {
                log::info!("seed {seed} step {position}: {step:?} -> {outcome:?}");
            }
            violations.extend(
                found
                    .into_iter()
                    .map(|message| format!("step {position} ({step:?}): {message}")),
            );
            steps.push(StepRecord {
                step: step.clone(),
                outcome,
                events: engine.drain_events(),
                views: capture_views(&engine),
                clock_ms: clock.now(),
            });
        }

        if steps.is_empty() {
            steps.push(StepRecord {
                step: Step::Checkpoint("opened"),
                outcome: StepOutcome::Done,
                events: Vec::new(),
                views: capture_views(&engine),
                clock_ms: clock.now(),
            });
        }

        let mut keys = vec![REWARDS_KEY.to_string()];
        keys.extend(engine.profile_ids().iter().map(|id| profile_key(id)));
        Ok(RunSummary {
            seed,
            open_events,
            steps,
            rewards: engine.reward_list().as_slice().to_vec(),
            records: storage.records(&keys).into_iter().collect(),
            violations,
        })
    }
}

fn open_engine(plan: &CardPlan, storage: &ScenarioStorage, clock: &ManualClock) -> Result<CardEngine> {
    BingoEngine::open(plan.config.clone(), storage.clone(), clock.clone())
        .context("engine failed to open")
}

fn apply(engine: &mut CardEngine, clock: &ManualClock, step: &Step) -> StepOutcome {
    let result = match step {
        Step::Mark { profile, index } => engine.mark_cell(profile, *index).map(StepOutcome::Marked),
        Step::Unmark { profile, index } => {
            engine.unmark_cell(profile, *index).map(StepOutcome::Unmarked)
        }
        Step::Toggle { profile, index } => {
            engine.toggle_cell(profile, *index).map(StepOutcome::Toggled)
        }
        Step::ConfirmUnmark { profile } => {
            engine.confirm_unmark(profile).map(StepOutcome::Unmarked)
        }
        Step::Dismiss { profile } => engine
            .dismiss_notification(profile)
            .map(|()| StepOutcome::Done),
        Step::Advance(by) => {
            clock.advance(*by);
            engine.poll();
            Ok(StepOutcome::Done)
        }
        Step::SetRewards(rewards) => engine
            .set_reward_list(rewards.clone())
            .map(|()| StepOutcome::Done),
        Step::SetLabels { profile, labels } => engine
            .set_grid_labels(profile, labels.clone())
            .map(|()| StepOutcome::Done),
        Step::Reset { profile } => engine.reset_profile(profile).map(|()| StepOutcome::Done),
        Step::Reload | Step::Settle | Step::RandomPlay { .. } | Step::Checkpoint(_) => {
            Ok(StepOutcome::Done)
        }
    };
    result.unwrap_or_else(StepOutcome::Rejected)
}

fn settle(engine: &mut CardEngine, clock: &ManualClock) -> Vec<String> {
    for _ in 0..MAX_SETTLE_FIRINGS {
        let Some(deadline) = engine.next_deadline() else {
            return Vec::new();
        };
        clock.set(deadline.max(clock.now()));
        engine.poll();
    }
    vec![format!(
        "timers still pending after {MAX_SETTLE_FIRINGS} firings"
    )]
}

fn random_play(
    engine: &mut CardEngine,
    clock: &ManualClock,
    rng: &mut ChaCha8Rng,
    profile: &str,
    steps: usize,
) -> Vec<String> {
    let cells = engine.layout().cells();
    let mut found = Vec::new();
    for turn in 0..steps {
        let before = capture_views(engine);
        let step = match rng.gen_range(0..11) {
            0..=4 => Step::mark(profile, rng.gen_range(0..=cells)),
            5..=6 => Step::unmark(profile, rng.gen_range(0..cells)),
            7 => Step::dismiss(profile),
            8 => Step::SetRewards(
                (0..rng.gen_range(1..=8))
                    .map(|i| format!("forfeit {i}"))
                    .collect(),
            ),
            _ => Step::Advance(rng.gen_range(0..3_000)),
        };
        let outcome = apply(engine, clock, &step);
        if let StepOutcome::Rejected(err) = &outcome
            && !err.is_invalid_index()
        {
            found.push(format!("turn {turn}: unexpected rejection {err}"));
        }
        found.extend(
            check_cursor_moves(engine, &before, &step, &outcome)
                .into_iter()
                .chain(check_cards(engine))
                .map(|message| format!("turn {turn}: {message}")),
        );
    }
    found
}

fn capture_views(engine: &CardEngine) -> Vec<ProfileView> {
    engine
        .profile_ids()
        .iter()
        .filter_map(|id| {
            let profile = engine.profile(id)?;
            Some(ProfileView {
                id: id.clone(),
                score: profile.score(),
                marked: profile.marked().iter().collect(),
                completed: profile.ledger().iter().collect(),
                committed: profile.cursor().committed(),
                revealed: profile.cursor().revealed(),
                current_reward: engine.current_reward(id).ok()?.to_string(),
                notification: engine.notification_state(id).ok()?.kind(),
                labels: profile.labels().as_slice().to_vec(),
            })
        })
        .collect()
}

/// Card-level invariants that hold after every host call.
fn check_cards(engine: &CardEngine) -> Vec<String> {
    let mut found = Vec::new();
    for id in engine.profile_ids() {
        let Some(profile) = engine.profile(id) else {
            continue;
        };
        let layout = profile.layout();
        if !profile.is_marked(layout.free_index()) {
            found.push(format!("{id}: free cell {} not marked", layout.free_index()));
        }
        let complete = detect(profile.marked());
        for line in profile.ledger().iter() {
            if !complete.contains(&line) {
                found.push(format!("{id}: awarded line {line} is not complete"));
            }
        }
        let len = engine.reward_list().len();
        let cursor = profile.cursor();
        if len > 0 && (cursor.committed() >= len || cursor.revealed() >= len) {
            found.push(format!("{id}: cursor {cursor:?} outside {len} rewards"));
        }
    }
    found
}

/// The committed cursor moves exactly one step per newly completed line.
fn check_cursor_moves(
    engine: &CardEngine,
    before: &[ProfileView],
    step: &Step,
    outcome: &StepOutcome,
) -> Vec<String> {
    if matches!(step, Step::SetRewards(_) | Step::Reset { .. })
        && !matches!(outcome, StepOutcome::Rejected(_))
    {
        return Vec::new();
    }
    let target = match step {
        Step::Mark { profile, .. } | Step::Toggle { profile, .. } => Some(profile.as_str()),
        _ => None,
    };
    let len = engine.reward_list().len();
    let after = capture_views(engine);
    let mut found = Vec::new();
    for view in &after {
        let Ok(previous) = find_view(before, &view.id) else {
            continue;
        };
        let steps = if target == Some(view.id.as_str()) {
            outcome.newly_completed().len()
        } else {
            0
        };
        let expected = if len == 0 {
            0
        } else {
            (previous.committed + steps) % len
        };
        if view.committed != expected {
            found.push(format!(
                "{}: cursor moved {} -> {} for {steps} new line(s)",
                view.id, previous.committed, view.committed
            ));
        }
    }
    found
}

fn slug(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_row_completion_is_recorded() {
        let plan = CardPlan::default()
            .then_all(Step::marks("Martyn", &[0, 1, 2, 3, 4]))
            .then(Step::Checkpoint("row"))
            .then(Step::Settle);
        let summary = CardTester::new(false).run_plan(&plan, "row", 1).unwrap();
        assert!(summary.violations.is_empty(), "{:?}", summary.violations);
        assert_eq!(summary.completions("Martyn"), vec![vec![Line::Row(0)]]);
        let row = summary.checkpoint("row").unwrap();
        assert_eq!(row.view("Martyn").unwrap().notification, NotificationKind::ShowingAck);
        let last = summary.profile("Martyn").unwrap();
        assert_eq!(last.revealed, 1);
        assert_eq!(summary.steps.last().unwrap().clock_ms, 7_500);
    }

    #[test]
    fn rejected_steps_are_kept_as_outcomes() {
        let plan = CardPlan::default()
            .then(Step::mark("Martyn", 12))
            .then(Step::confirm_unmark("Sarah"));
        let summary = CardTester::new(false).run_plan(&plan, "reject", 1).unwrap();
        assert_eq!(summary.rejections().len(), 2);
        assert_eq!(summary.rejections()[1], &EngineError::NoPendingUnmark);
    }

    #[test]
    fn random_play_is_reproducible_per_seed() {
        let plan = CardPlan::default().then(Step::random_play("Sarah", 150));
        let tester = CardTester::new(false);
        let first = tester.run_plan(&plan, "random", 99).unwrap();
        let second = tester.run_plan(&plan, "random", 99).unwrap();
        assert!(first.violations.is_empty(), "{:?}", first.violations);
        assert_eq!(first.profile("Sarah").unwrap(), second.profile("Sarah").unwrap());
    }

    #[test]
    fn empty_plans_still_report_the_opened_state() {
        let summary = CardTester::new(false)
            .run_plan(&CardPlan::default(), "empty", 0)
            .unwrap();
        assert_eq!(summary.profile("Sarah").unwrap().score, 1);
        assert_eq!(summary.rewards.len(), 6);
        assert!(summary.records.values().all(Option::is_some));
    }

    #[test]
    fn slugs_are_file_safe() {
        assert_eq!(slug("Reward Wrap (6/5/+2)"), "reward-wrap--6-5--2-");
    }
}
