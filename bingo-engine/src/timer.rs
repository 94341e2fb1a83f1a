//! Cancellable deadlines and the time source that drives them.
//!
//! Nothing here sleeps. Deadlines are plain timestamps that the engine checks
//! whenever the host calls in, so tests move time by hand.
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Milliseconds on the engine's monotonic timeline.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Auto-dismiss of the single-cell acknowledgement.
    Ack,
    /// Start or auto-dismiss of the line celebration.
    Celebration,
}

/// At most one pending deadline per [`TimerKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    ack: Option<Millis>,
    celebration: Option<Millis>,
}

impl Scheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ack: None,
            celebration: None,
        }
    }

    /// Arm a timer. Any pending deadline of the same kind is cancelled.
    pub fn schedule(&mut self, kind: TimerKind, due_at: Millis) {
        *self.slot_mut(kind) = Some(due_at);
    }

    /// Cancel a timer, returning its deadline if one was pending.
    pub fn cancel(&mut self, kind: TimerKind) -> Option<Millis> {
        self.slot_mut(kind).take()
    }

    #[must_use]
    pub const fn deadline(&self, kind: TimerKind) -> Option<Millis> {
        match kind {
            TimerKind::Ack => self.ack,
            TimerKind::Celebration => self.celebration,
        }
    }

    #[must_use]
    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.deadline(kind).is_some()
    }

    /// Earliest pending deadline of any kind.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Millis> {
        match (self.ack, self.celebration) {
            (Some(a), Some(c)) => Some(a.min(c)),
            (a, c) => a.or(c),
        }
    }

    /// Remove and return the earliest timer due at or before `now`. The ack
    /// timer wins ties so an acknowledgement always closes first.
    pub fn pop_due(&mut self, now: Millis) -> Option<(TimerKind, Millis)> {
        let candidates = [
            (TimerKind::Ack, self.ack),
            (TimerKind::Celebration, self.celebration),
        ];
        let (kind, due_at) = candidates
            .into_iter()
            .filter_map(|(kind, due)| due.filter(|&at| at <= now).map(|at| (kind, at)))
            .min_by_key(|&(_, at)| at)?;
        self.cancel(kind);
        Some((kind, due_at))
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<Millis> {
        match kind {
            TimerKind::Ack => &mut self.ack,
            TimerKind::Celebration => &mut self.celebration,
        }
    }
}

/// Source of "now" for deadline checks.
pub trait Clock {
    fn now(&self) -> Millis;
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: Millis) {
        self.now.set(self.now.get().saturating_add(by));
    }

    pub fn set(&self, at: Millis) {
        self.now.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.get()
    }
}

/// Wall-clock time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(Millis::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduling_same_kind_replaces_deadline() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKind::Ack, 2_000);
        scheduler.schedule(TimerKind::Ack, 2_600);
        assert_eq!(scheduler.deadline(TimerKind::Ack), Some(2_600));
        assert_eq!(scheduler.pop_due(2_000), None);
        assert_eq!(scheduler.pop_due(2_600), Some((TimerKind::Ack, 2_600)));
        assert_eq!(scheduler.pop_due(10_000), None);
    }

    #[test]
    fn pop_due_returns_earliest_first_and_ack_on_ties() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKind::Celebration, 500);
        scheduler.schedule(TimerKind::Ack, 900);
        assert_eq!(scheduler.next_deadline(), Some(500));
        assert_eq!(scheduler.pop_due(1_000), Some((TimerKind::Celebration, 500)));
        assert_eq!(scheduler.pop_due(1_000), Some((TimerKind::Ack, 900)));

        scheduler.schedule(TimerKind::Celebration, 1_000);
        scheduler.schedule(TimerKind::Ack, 1_000);
        assert_eq!(scheduler.pop_due(1_000).map(|(kind, _)| kind), Some(TimerKind::Ack));
    }

    #[test]
    fn cancel_clears_only_its_kind() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(TimerKind::Ack, 10);
        scheduler.schedule(TimerKind::Celebration, 20);
        assert_eq!(scheduler.cancel(TimerKind::Ack), Some(10));
        assert_eq!(scheduler.cancel(TimerKind::Ack), None);
        assert!(scheduler.is_pending(TimerKind::Celebration));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let view = clock.clone();
        clock.advance(250);
        assert_eq!(view.now(), 350);
        view.set(5);
        assert_eq!(clock.now(), 5);
    }
}
