//! Overlay sequencing for one player.
//!
//! Two transient overlays exist: a short acknowledgement after every
//! successful mark and a longer celebration when lines complete. A mark that
//! does both always shows the acknowledgement first; the celebration starts a
//! short gap after the acknowledgement has closed.
//!
//! ```text
//!  Idle ──mark──▶ ShowingAck ──timeout/dismiss──▶ Idle ──gap──▶ ShowingCelebration
//!   ▲                                                               │
//!   └────────────────────────timeout/dismiss────────────────────────┘
//! ```
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ACK_MS, DEFAULT_CELEBRATION_GAP_MS, DEFAULT_CELEBRATION_MS};
use crate::grid::CellIndex;
use crate::line::Line;
use crate::timer::{Millis, Scheduler, TimerKind};

/// Overlay durations in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTimings {
    #[serde(default = "default_ack_ms")]
    pub ack_ms: Millis,
    #[serde(default = "default_celebration_gap_ms")]
    pub celebration_gap_ms: Millis,
    #[serde(default = "default_celebration_ms")]
    pub celebration_ms: Millis,
}

impl Default for NotificationTimings {
    fn default() -> Self {
        Self {
            ack_ms: DEFAULT_ACK_MS,
            celebration_gap_ms: DEFAULT_CELEBRATION_GAP_MS,
            celebration_ms: DEFAULT_CELEBRATION_MS,
        }
    }
}

const fn default_ack_ms() -> Millis {
    DEFAULT_ACK_MS
}

const fn default_celebration_gap_ms() -> Millis {
    DEFAULT_CELEBRATION_GAP_MS
}

const fn default_celebration_ms() -> Millis {
    DEFAULT_CELEBRATION_MS
}

/// One coalesced celebration covering every line completed since the last
/// one was queued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Celebration {
    pub lines: Vec<Line>,
}

impl Celebration {
    /// Reward steps this celebration reveals when it closes.
    #[must_use]
    pub fn advance(&self) -> usize {
        self.lines.len()
    }

    fn absorb(&mut self, lines: &[Line]) {
        self.lines.extend_from_slice(lines);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NotificationState {
    #[default]
    Idle,
    ShowingAck {
        index: CellIndex,
    },
    ShowingCelebration(Celebration),
}

impl NotificationState {
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::Idle => NotificationKind::Idle,
            Self::ShowingAck { .. } => NotificationKind::ShowingAck,
            Self::ShowingCelebration(_) => NotificationKind::ShowingCelebration,
        }
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Payload-free view of [`NotificationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Idle,
    ShowingAck,
    ShowingCelebration,
}

/// How an overlay went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseCause {
    Timeout,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    Changed(NotificationState),
    CelebrationClosed {
        celebration: Celebration,
        cause: CloseCause,
    },
}

#[derive(Debug, Clone, Default)]
pub struct NotificationSequencer {
    timings: NotificationTimings,
    state: NotificationState,
    queued: Option<Celebration>,
    timers: Scheduler,
}

impl NotificationSequencer {
    #[must_use]
    pub fn new(timings: NotificationTimings) -> Self {
        Self {
            timings,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn state(&self) -> &NotificationState {
        &self.state
    }

    /// Celebration waiting for the acknowledgement (or a running celebration)
    /// to finish.
    #[must_use]
    pub const fn queued(&self) -> Option<&Celebration> {
        self.queued.as_ref()
    }

    /// Reward steps the showing and queued celebrations will still reveal.
    #[must_use]
    pub fn owed_reveals(&self) -> usize {
        let showing = match &self.state {
            NotificationState::ShowingCelebration(celebration) => celebration.advance(),
            _ => 0,
        };
        showing + self.queued.as_ref().map_or(0, Celebration::advance)
    }

    #[must_use]
    pub const fn timers(&self) -> &Scheduler {
        &self.timers
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Millis> {
        self.timers.next_deadline()
    }

    /// A cell was marked. Shows (or restarts) the acknowledgement unless a
    /// celebration is on screen, which is never interrupted.
    pub fn on_cell_marked(&mut self, index: CellIndex, now: Millis) -> Vec<SequencerEvent> {
        if matches!(self.state, NotificationState::ShowingCelebration(_)) {
            return Vec::new();
        }
        if self.state.is_idle() && self.queued.is_some() {
            // the celebration start waits for this acknowledgement instead
            self.timers.cancel(TimerKind::Celebration);
        }
        self.state = NotificationState::ShowingAck { index };
        self.timers
            .schedule(TimerKind::Ack, now.saturating_add(self.timings.ack_ms));
        vec![SequencerEvent::Changed(self.state.clone())]
    }

    /// Queue a celebration for freshly completed lines, coalescing with any
    /// celebration already waiting.
    pub fn queue_celebration(&mut self, lines: &[Line], now: Millis) {
        if lines.is_empty() {
            return;
        }
        self.queued.get_or_insert_with(Celebration::default).absorb(lines);
        if self.state.is_idle() && !self.timers.is_pending(TimerKind::Celebration) {
            self.schedule_start(now);
        }
    }

    /// Explicit user dismissal. A no-op while idle.
    pub fn dismiss(&mut self, now: Millis) -> Vec<SequencerEvent> {
        match self.state.kind() {
            NotificationKind::Idle => Vec::new(),
            NotificationKind::ShowingAck => self.close_ack(now),
            NotificationKind::ShowingCelebration => {
                self.close_celebration(now, CloseCause::Dismissed)
            }
        }
    }

    /// Fire every timer due at or before `now`, in deadline order. Follow-up
    /// timers are armed relative to the deadline that fired, so a late poll
    /// replays the same schedule.
    pub fn advance_to(&mut self, now: Millis) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        while let Some((kind, due_at)) = self.timers.pop_due(now) {
            log::debug!("notification timer {kind:?} fired at {due_at}");
            let fired = match (kind, self.state.kind()) {
                (TimerKind::Ack, NotificationKind::ShowingAck) => self.close_ack(due_at),
                (TimerKind::Celebration, NotificationKind::Idle) => self.start_celebration(due_at),
                (TimerKind::Celebration, NotificationKind::ShowingCelebration) => {
                    self.close_celebration(due_at, CloseCause::Timeout)
                }
                _ => Vec::new(),
            };
            events.extend(fired);
        }
        events
    }

    /// Drop every overlay, queued celebration and timer.
    pub fn reset(&mut self) -> Vec<SequencerEvent> {
        self.queued = None;
        self.timers = Scheduler::new();
        if self.state.is_idle() {
            return Vec::new();
        }
        self.state = NotificationState::Idle;
        vec![SequencerEvent::Changed(NotificationState::Idle)]
    }

    fn close_ack(&mut self, at: Millis) -> Vec<SequencerEvent> {
        self.timers.cancel(TimerKind::Ack);
        self.state = NotificationState::Idle;
        if self.queued.is_some() {
            self.schedule_start(at);
        }
        vec![SequencerEvent::Changed(NotificationState::Idle)]
    }

    fn start_celebration(&mut self, at: Millis) -> Vec<SequencerEvent> {
        let Some(celebration) = self.queued.take() else {
            return Vec::new();
        };
        self.state = NotificationState::ShowingCelebration(celebration);
        self.timers.schedule(
            TimerKind::Celebration,
            at.saturating_add(self.timings.celebration_ms),
        );
        vec![SequencerEvent::Changed(self.state.clone())]
    }

    fn close_celebration(&mut self, at: Millis, cause: CloseCause) -> Vec<SequencerEvent> {
        self.timers.cancel(TimerKind::Celebration);
        let NotificationState::ShowingCelebration(celebration) =
            std::mem::take(&mut self.state)
        else {
            return Vec::new();
        };
        if self.queued.is_some() {
            self.schedule_start(at);
        }
        vec![
            SequencerEvent::CelebrationClosed { celebration, cause },
            SequencerEvent::Changed(NotificationState::Idle),
        ]
    }

    fn schedule_start(&mut self, from: Millis) {
        self.timers.schedule(
            TimerKind::Celebration,
            from.saturating_add(self.timings.celebration_gap_ms),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(events: &[SequencerEvent]) -> Vec<NotificationKind> {
        events
            .iter()
            .filter_map(|event| match event {
                SequencerEvent::Changed(state) => Some(state.kind()),
                SequencerEvent::CelebrationClosed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn ack_auto_dismisses_after_its_duration() {
        let mut seq = NotificationSequencer::default();
        let events = seq.on_cell_marked(3, 0);
        assert_eq!(kinds(&events), vec![NotificationKind::ShowingAck]);
        assert!(seq.advance_to(1_999).is_empty());
        assert_eq!(kinds(&seq.advance_to(2_000)), vec![NotificationKind::Idle]);
        assert!(seq.next_deadline().is_none());
    }

    #[test]
    fn celebration_waits_for_ack_plus_gap() {
        let mut seq = NotificationSequencer::default();
        seq.on_cell_marked(4, 0);
        seq.queue_celebration(&[Line::Row(0)], 0);
        assert!(matches!(seq.state(), NotificationState::ShowingAck { index: 4 }));

        assert_eq!(kinds(&seq.advance_to(2_499)), vec![NotificationKind::Idle]);
        assert_eq!(
            kinds(&seq.advance_to(2_500)),
            vec![NotificationKind::ShowingCelebration]
        );
        let closed = seq.advance_to(7_500);
        assert!(matches!(
            &closed[0],
            SequencerEvent::CelebrationClosed { cause: CloseCause::Timeout, celebration }
                if celebration.lines == vec![Line::Row(0)]
        ));
        assert!(seq.state().is_idle());
    }

    #[test]
    fn owed_reveals_count_showing_and_queued_lines() {
        let mut seq = NotificationSequencer::default();
        assert_eq!(seq.owed_reveals(), 0);
        seq.queue_celebration(&[Line::Row(0), Line::Column(4)], 0);
        assert_eq!(seq.owed_reveals(), 2);

        seq.advance_to(500);
        seq.on_cell_marked(9, 600);
        seq.queue_celebration(&[Line::Row(1)], 600);
        assert!(matches!(seq.state(), NotificationState::ShowingCelebration(_)));
        assert_eq!(seq.owed_reveals(), 3);

        seq.dismiss(700);
        assert_eq!(seq.owed_reveals(), 1);
        seq.reset();
        assert_eq!(seq.owed_reveals(), 0);
    }

    #[test]
    fn dismissing_ack_early_pulls_celebration_forward() {
        let mut seq = NotificationSequencer::default();
        seq.on_cell_marked(4, 0);
        seq.queue_celebration(&[Line::Column(4)], 0);
        assert_eq!(kinds(&seq.dismiss(300)), vec![NotificationKind::Idle]);
        assert_eq!(seq.timers().deadline(TimerKind::Celebration), Some(800));
        assert_eq!(
            kinds(&seq.advance_to(800)),
            vec![NotificationKind::ShowingCelebration]
        );
        let events = seq.dismiss(900);
        assert!(matches!(
            events[0],
            SequencerEvent::CelebrationClosed { cause: CloseCause::Dismissed, .. }
        ));
    }

    #[test]
    fn mark_inside_gap_postpones_celebration() {
        let mut seq = NotificationSequencer::default();
        seq.on_cell_marked(1, 0);
        seq.queue_celebration(&[Line::Row(0)], 0);
        seq.advance_to(2_000);
        assert!(seq.state().is_idle());

        seq.on_cell_marked(7, 2_200);
        assert!(!seq.timers().is_pending(TimerKind::Celebration));
        assert!(seq.advance_to(3_000).is_empty());
        assert_eq!(kinds(&seq.advance_to(4_200)), vec![NotificationKind::Idle]);
        assert_eq!(
            kinds(&seq.advance_to(4_700)),
            vec![NotificationKind::ShowingCelebration]
        );
    }

    #[test]
    fn completions_during_celebration_coalesce_into_one_follow_up() {
        let mut seq = NotificationSequencer::default();
        seq.queue_celebration(&[Line::Row(0)], 0);
        seq.advance_to(500);
        assert_eq!(seq.state().kind(), NotificationKind::ShowingCelebration);

        assert!(seq.on_cell_marked(9, 600).is_empty());
        seq.queue_celebration(&[Line::Column(4)], 600);
        seq.queue_celebration(&[Line::Row(1), Line::Diagonal], 700);
        assert_eq!(seq.queued().map(Celebration::advance), Some(3));

        seq.dismiss(1_000);
        seq.advance_to(1_500);
        match seq.state() {
            NotificationState::ShowingCelebration(celebration) => assert_eq!(
                celebration.lines,
                vec![Line::Column(4), Line::Row(1), Line::Diagonal]
            ),
            other => panic!("expected celebration, got {other:?}"),
        }
        assert!(seq.queued().is_none());
    }

    #[test]
    fn second_mark_restarts_the_ack() {
        let mut seq = NotificationSequencer::default();
        seq.on_cell_marked(1, 0);
        seq.on_cell_marked(2, 1_500);
        assert!(seq.advance_to(2_000).is_empty());
        assert_eq!(kinds(&seq.advance_to(3_500)), vec![NotificationKind::Idle]);
    }

    #[test]
    fn dismiss_while_idle_is_a_no_op() {
        let mut seq = NotificationSequencer::new(NotificationTimings {
            ack_ms: 10,
            celebration_gap_ms: 1,
            celebration_ms: 20,
        });
        assert!(seq.dismiss(0).is_empty());
        assert!(seq.reset().is_empty());
        seq.on_cell_marked(0, 0);
        assert_eq!(kinds(&seq.reset()), vec![NotificationKind::Idle]);
        assert!(seq.next_deadline().is_none());
    }

    #[test]
    fn timings_fill_missing_fields_with_defaults() {
        let timings: NotificationTimings = serde_json::from_str(r#"{"ack_ms": 750}"#).unwrap();
        assert_eq!(timings.ack_ms, 750);
        assert_eq!(timings.celebration_gap_ms, DEFAULT_CELEBRATION_GAP_MS);
        assert_eq!(timings.celebration_ms, DEFAULT_CELEBRATION_MS);
    }
}
