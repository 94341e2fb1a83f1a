use anyhow::{Context, Result, ensure};
use bingo_engine::{EngineConfig, EngineError, EngineEvent, Line, NotificationKind, profile_key};

use super::TestScenario;
use crate::logic::{CardPlan, RunSummary, Step};

const MARTYN: &str = "Martyn";
const SARAH: &str = "Sarah";

pub fn catalog_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::new("first-row", "First Row Completion", first_row_plan()),
        TestScenario::new("centre-cross", "Centre Cell Closes Four Lines", centre_cross_plan()),
        TestScenario::new("free-cell", "Free Cell Is Locked", free_cell_plan()),
        TestScenario::new("unmark-remark", "Unmark Reopens A Line", unmark_remark_plan()),
        TestScenario::new("reward-wrap", "Reward Cursor Wraps", reward_wrap_plan()),
        TestScenario::new(
            "reward-edit",
            "Reward Edit During A Celebration",
            reward_edit_plan(),
        ),
        TestScenario::new(
            "notification-order",
            "Ack Then Celebration Timing",
            notification_order_plan(),
        ),
        TestScenario::new(
            "dismissal-commit",
            "Dismissal Reveals The Next Reward",
            dismissal_commit_plan(),
        ),
        TestScenario::new("persistence-reload", "State Survives Reload", persistence_plan()),
        TestScenario::new("corrupt-fallback", "Corrupt Record Fallback", corrupt_plan()),
        TestScenario::new("validation", "Rejected Edits", validation_plan()),
        TestScenario::new("profile-reset", "Reset Clears One Card", reset_plan()),
        TestScenario::new("random-sweep", "Random Play 5x5", random_sweep_plan(5, None)),
        TestScenario::new(
            "random-sweep-3x3",
            "Random Play 3x3 Corner Free",
            random_sweep_plan(3, Some(0)),
        ),
    ]
}

fn first_row_plan() -> CardPlan {
    CardPlan::default()
        .then_all(Step::marks(MARTYN, &[0, 1, 2, 3, 4]))
        .then(Step::Checkpoint("marked"))
        .then(Step::Settle)
        .with_expectation(first_row_expectation)
}

fn first_row_expectation(summary: &RunSummary) -> Result<()> {
    ensure!(
        summary.completions(MARTYN) == vec![vec![Line::Row(0)]],
        "expected a single row:0 completion, got {:?}",
        summary.completions(MARTYN)
    );
    let marked = summary.checkpoint("marked")?.view(MARTYN)?;
    ensure!(marked.committed == 1, "committed cursor should move once");
    ensure!(marked.revealed == 0, "reward must stay hidden until the celebration closes");

    let martyn = summary.profile(MARTYN)?;
    ensure!(martyn.score == 6, "five marks plus the free cell, got {}", martyn.score);
    ensure!(
        martyn.current_reward == "Do a shot of tequila",
        "unexpected reward {}",
        martyn.current_reward
    );
    let sarah = summary.profile(SARAH)?;
    ensure!(sarah.committed == 0 && sarah.score == 1, "Sarah's card must not move");
    Ok(())
}

fn centre_cross_plan() -> CardPlan {
    let setup = [10, 11, 13, 14, 2, 7, 17, 22, 6, 18, 24, 4, 8, 16, 20];
    CardPlan::new(EngineConfig::default_config().with_grid(5, Some(0)))
        .then_all(Step::marks(MARTYN, &setup))
        .then(Step::mark(MARTYN, 12))
        .then(Step::Checkpoint("centre"))
        .then(Step::Settle)
        .with_expectation(centre_cross_expectation)
}

fn centre_cross_expectation(summary: &RunSummary) -> Result<()> {
    let completions = summary.completions(MARTYN);
    ensure!(
        completions
            == vec![vec![
                Line::Row(2),
                Line::Column(2),
                Line::Diagonal,
                Line::AntiDiagonal,
            ]],
        "expected one four-line completion in tie-break order, got {completions:?}"
    );
    let centre = summary.checkpoint("centre")?.view(MARTYN)?;
    ensure!(centre.committed == 4, "cursor should advance by four");
    let martyn = summary.profile(MARTYN)?;
    ensure!(
        martyn.current_reward == "Ask a stranger for a selfie",
        "unexpected reward {}",
        martyn.current_reward
    );
    Ok(())
}

fn free_cell_plan() -> CardPlan {
    CardPlan::default()
        .then(Step::mark(MARTYN, 12))
        .then(Step::unmark(MARTYN, 12))
        .then(Step::toggle(SARAH, 12))
        .then(Step::mark(SARAH, 25))
        .with_expectation(free_cell_expectation)
}

fn free_cell_expectation(summary: &RunSummary) -> Result<()> {
    let rejections = summary.rejections();
    ensure!(rejections.len() == 4, "all four edits must be rejected");
    ensure!(
        rejections.iter().all(|err| err.is_invalid_index()),
        "expected InvalidIndex rejections, got {rejections:?}"
    );
    ensure!(
        summary.events().next().is_none(),
        "rejected edits must not emit events"
    );
    for id in [MARTYN, SARAH] {
        let view = summary.profile(id)?;
        ensure!(view.marked == vec![12], "{id} should only have the free cell");
    }
    Ok(())
}

fn unmark_remark_plan() -> CardPlan {
    CardPlan::default()
        .then_all(Step::marks(SARAH, &[2, 7, 17, 22]))
        .then(Step::toggle(SARAH, 7))
        .then(Step::Checkpoint("asked"))
        .then(Step::confirm_unmark(SARAH))
        .then(Step::Checkpoint("reopened"))
        .then(Step::toggle(SARAH, 7))
        .then(Step::mark(SARAH, 7))
        .with_expectation(unmark_remark_expectation)
}

fn unmark_remark_expectation(summary: &RunSummary) -> Result<()> {
    let asked = summary.checkpoint("asked")?.view(SARAH)?;
    ensure!(
        asked.marked.contains(&7),
        "toggling a marked cell must wait for confirmation"
    );
    let reopened = summary.checkpoint("reopened")?.view(SARAH)?;
    ensure!(reopened.completed.is_empty(), "col:2 should be reopened");
    ensure!(reopened.committed == 1, "unmarking never rewinds the cursor");

    ensure!(
        summary.completions(SARAH) == vec![vec![Line::Column(2)], vec![Line::Column(2)]],
        "col:2 should pay out twice, got {:?}",
        summary.completions(SARAH)
    );
    let sarah = summary.profile(SARAH)?;
    ensure!(sarah.committed == 2, "second payout moves the cursor again");
    Ok(())
}

fn reward_wrap_plan() -> CardPlan {
    CardPlan::default()
        .with_record(profile_key(MARTYN), r#"{"rewardCursor":5}"#)
        .then_all(Step::marks(MARTYN, &[0, 1, 2, 3, 9, 14, 19, 24]))
        .then(Step::mark(MARTYN, 4))
        .then(Step::Checkpoint("double"))
        .then(Step::Settle)
        .with_expectation(reward_wrap_expectation)
}

fn reward_wrap_expectation(summary: &RunSummary) -> Result<()> {
    ensure!(
        summary.completions(MARTYN) == vec![vec![Line::Row(0), Line::Column(4)]],
        "rows are awarded before columns"
    );
    let double = summary.checkpoint("double")?.view(MARTYN)?;
    ensure!(double.committed == 1, "5 + 2 wraps to 1 in a list of 6");
    ensure!(double.current_reward == "Dance on a table", "reveal waits for the celebration");
    let martyn = summary.profile(MARTYN)?;
    ensure!(martyn.current_reward == "Do a shot of tequila", "wrapped reward not revealed");
    Ok(())
}

fn reward_edit_plan() -> CardPlan {
    CardPlan::default()
        .with_record(profile_key(MARTYN), r#"{"rewardCursor":5}"#)
        .then_all(Step::marks(MARTYN, &[0, 1, 2, 3, 9, 14, 19, 24, 4]))
        .then(Step::SetRewards(
            ["a", "b", "c", "d"].map(String::from).to_vec(),
        ))
        .then(Step::Checkpoint("edited"))
        .then(Step::Settle)
        .with_expectation(reward_edit_expectation)
}

fn reward_edit_expectation(summary: &RunSummary) -> Result<()> {
    let edited = summary.checkpoint("edited")?.view(MARTYN)?;
    ensure!(edited.committed == 1, "cursor should be clamped to 1, got {}", edited.committed);
    ensure!(
        edited.current_reward == "d",
        "two reveals are still owed, got {}",
        edited.current_reward
    );
    let martyn = summary.profile(MARTYN)?;
    ensure!(
        martyn.revealed == martyn.committed,
        "revealed {} lags committed {} after settling",
        martyn.revealed,
        martyn.committed
    );
    ensure!(martyn.current_reward == "b", "unexpected reward {}", martyn.current_reward);
    Ok(())
}

fn notification_order_plan() -> CardPlan {
    CardPlan::default()
        .then_all(Step::marks(MARTYN, &[0, 1, 2, 3, 4]))
        .then(Step::Advance(1_999))
        .then(Step::Checkpoint("ack"))
        .then(Step::Advance(1))
        .then(Step::Checkpoint("gap"))
        .then(Step::Advance(500))
        .then(Step::Checkpoint("celebration"))
        .then(Step::Advance(5_000))
        .then(Step::Checkpoint("closed"))
        .with_expectation(notification_order_expectation)
}

fn notification_order_expectation(summary: &RunSummary) -> Result<()> {
    let expected = [
        ("ack", 1_999, NotificationKind::ShowingAck, 0),
        ("gap", 2_000, NotificationKind::Idle, 0),
        ("celebration", 2_500, NotificationKind::ShowingCelebration, 0),
        ("closed", 7_500, NotificationKind::Idle, 1),
    ];
    for (name, at, kind, revealed) in expected {
        let record = summary.checkpoint(name)?;
        let view = record.view(MARTYN)?;
        ensure!(record.clock_ms == at, "{name}: clock at {}", record.clock_ms);
        ensure!(
            view.notification == kind,
            "{name}: expected {kind:?}, got {:?}",
            view.notification
        );
        ensure!(view.revealed == revealed, "{name}: revealed {}", view.revealed);
    }

    let sequence = summary.notifications(MARTYN);
    let acks = sequence
        .iter()
        .take_while(|kind| **kind == NotificationKind::ShowingAck)
        .count();
    ensure!(acks == 5, "each mark restarts the ack, got {sequence:?}");
    ensure!(
        sequence[acks..]
            == [
                NotificationKind::Idle,
                NotificationKind::ShowingCelebration,
                NotificationKind::Idle,
            ],
        "celebration must follow the ack, got {sequence:?}"
    );
    Ok(())
}

fn dismissal_commit_plan() -> CardPlan {
    CardPlan::default()
        .then_all(Step::marks(MARTYN, &[0, 1, 2, 3, 4]))
        .then(Step::Advance(2_500))
        .then(Step::Checkpoint("showing"))
        .then(Step::dismiss(MARTYN))
        .then(Step::Checkpoint("dismissed"))
        .with_expectation(dismissal_commit_expectation)
}

fn dismissal_commit_expectation(summary: &RunSummary) -> Result<()> {
    let showing = summary.checkpoint("showing")?.view(MARTYN)?;
    ensure!(
        showing.notification == NotificationKind::ShowingCelebration,
        "celebration should be up at 2.5s"
    );
    ensure!(
        showing.current_reward == "Buy a round of shots",
        "the reward being celebrated is still current"
    );

    let dismissed = summary.checkpoint("dismissed")?;
    let view = dismissed.view(MARTYN)?;
    ensure!(view.notification == NotificationKind::Idle, "dismissal closes the overlay");
    ensure!(view.current_reward == "Do a shot of tequila", "dismissal reveals the next reward");
    ensure!(dismissed.clock_ms == 2_500, "dismissal must not wait for the timeout");
    Ok(())
}

fn persistence_plan() -> CardPlan {
    let labels = (0..25).map(|i| format!("dare {i}")).collect();
    CardPlan::default()
        .then_all(Step::marks(SARAH, &[0, 6, 18, 24]))
        .then(Step::Settle)
        .then(Step::set_labels(MARTYN, labels))
        .then(Step::Reload)
        .then(Step::Checkpoint("reloaded"))
        .with_expectation(persistence_expectation)
}

fn persistence_expectation(summary: &RunSummary) -> Result<()> {
    let reloaded = summary.checkpoint("reloaded")?;
    let sarah = reloaded.view(SARAH)?;
    ensure!(sarah.score == 5, "marks should survive reload, got {}", sarah.score);
    ensure!(sarah.completed == vec![Line::Diagonal], "diag:1 should stay awarded");
    ensure!(sarah.current_reward == "Do a shot of tequila", "cursor should survive reload");
    ensure!(
        sarah.notification == NotificationKind::Idle,
        "overlays are not persisted"
    );
    let martyn = reloaded.view(MARTYN)?;
    ensure!(
        martyn.labels.get(3).map(String::as_str) == Some("dare 3"),
        "edited labels should survive reload"
    );

    let raw = summary
        .records
        .get(&profile_key(SARAH))
        .cloned()
        .flatten()
        .context("Sarah's record was never written")?;
    ensure!(raw.contains("\"diag:1\""), "lines are stored as tags: {raw}");
    Ok(())
}

fn corrupt_plan() -> CardPlan {
    CardPlan::default()
        .with_record(profile_key(SARAH), "{not json")
        .with_record(profile_key(MARTYN), r#"{"markedIndices":[0,1]}"#)
        .with_expectation(corrupt_expectation)
}

fn corrupt_expectation(summary: &RunSummary) -> Result<()> {
    let sarah_warned = summary.warnings().iter().any(|event| {
        matches!(event, EngineEvent::Warning { profile_id: Some(id), .. } if id == SARAH)
    });
    ensure!(sarah_warned, "a corrupt record should raise a warning for Sarah");

    let sarah = summary.profile(SARAH)?;
    ensure!(sarah.score == 1, "Sarah falls back to a fresh card");
    let martyn = summary.profile(MARTYN)?;
    ensure!(
        martyn.marked == vec![0, 1, 12],
        "partial records fill in defaults, got {:?}",
        martyn.marked
    );
    ensure!(martyn.labels.len() == 25, "missing labels use the defaults");

    let rewritten = summary
        .records
        .get(&profile_key(SARAH))
        .cloned()
        .flatten()
        .context("fallback card was not persisted")?;
    ensure!(
        serde_json::from_str::<serde_json::Value>(&rewritten).is_ok(),
        "fallback card should be valid JSON"
    );
    Ok(())
}

fn validation_plan() -> CardPlan {
    CardPlan::default()
        .then(Step::SetRewards(Vec::new()))
        .then(Step::set_labels(MARTYN, vec!["too short".into()]))
        .then(Step::mark("Nobody", 0))
        .then(Step::confirm_unmark(SARAH))
        .then(Step::SetRewards(vec!["sing".into(), "dance".into()]))
        .then(Step::Checkpoint("edited"))
        .with_expectation(validation_expectation)
}

fn validation_expectation(summary: &RunSummary) -> Result<()> {
    let rejections = summary.rejections();
    ensure!(
        rejections
            == vec![
                &EngineError::EmptyRewardList,
                &EngineError::LabelCountMismatch {
                    expected: 25,
                    actual: 1
                },
                &EngineError::UnknownProfile("Nobody".into()),
                &EngineError::NoPendingUnmark,
            ],
        "unexpected rejections {rejections:?}"
    );
    ensure!(summary.rewards == ["sing", "dance"], "valid edit should apply");
    let edited = summary.checkpoint("edited")?.view(SARAH)?;
    ensure!(edited.current_reward == "sing", "cursor resets into the new list");
    Ok(())
}

fn reset_plan() -> CardPlan {
    CardPlan::default()
        .then_all(Step::marks(MARTYN, &[0, 1, 2, 3, 4]))
        .then_all(Step::marks(SARAH, &[2, 7, 17, 22]))
        .then(Step::Advance(1_000))
        .then(Step::reset(MARTYN))
        .then(Step::Checkpoint("reset"))
        .then(Step::Settle)
        .with_expectation(reset_expectation)
}

fn reset_expectation(summary: &RunSummary) -> Result<()> {
    let reset = summary.checkpoint("reset")?;
    let martyn = reset.view(MARTYN)?;
    ensure!(martyn.marked == vec![12], "only the free cell survives a reset");
    ensure!(martyn.completed.is_empty(), "awards are cleared");
    ensure!(martyn.committed == 0 && martyn.revealed == 0, "cursor returns to the start");
    ensure!(martyn.notification == NotificationKind::Idle, "pending overlays are dropped");
    ensure!(martyn.labels.len() == 25, "card text is kept");

    let sarah = summary.profile(SARAH)?;
    ensure!(sarah.committed == 1 && sarah.revealed == 1, "other cards are untouched");
    ensure!(
        summary.profile(MARTYN)?.revealed == 0,
        "a dropped celebration never reveals"
    );
    Ok(())
}

fn random_sweep_plan(side: usize, free_index: Option<usize>) -> CardPlan {
    CardPlan::new(EngineConfig::default_config().with_grid(side, free_index))
        .then(Step::random_play(MARTYN, 300))
        .then(Step::random_play(SARAH, 300))
        .then(Step::Settle)
        .with_expectation(random_sweep_expectation)
}

fn random_sweep_expectation(summary: &RunSummary) -> Result<()> {
    ensure!(
        summary.warnings().is_empty(),
        "random play should not warn: {:?}",
        summary.warnings()
    );
    for id in [MARTYN, SARAH] {
        let view = summary.profile(id)?;
        ensure!(
            view.revealed == view.committed,
            "{id}: revealed {} lags committed {} after settling",
            view.revealed,
            view.committed
        );
        ensure!(
            view.notification == NotificationKind::Idle,
            "{id}: overlay still showing after settling"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::CardTester;

    #[test]
    fn every_catalog_scenario_passes() {
        let tester = CardTester::new(false);
        for scenario in catalog_scenarios() {
            for seed in [1, 7] {
                let summary = tester.run_plan(&scenario.plan, scenario.key, seed).unwrap();
                assert!(
                    summary.violations.is_empty(),
                    "{}: {:?}",
                    scenario.key,
                    summary.violations
                );
                for expectation in &scenario.plan.expectations {
                    expectation
                        .evaluate(&summary)
                        .unwrap_or_else(|err| panic!("{} (seed {seed}): {err:#}", scenario.key));
                }
            }
        }
    }
}
