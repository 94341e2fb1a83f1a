//! Async helpers for hosts that run the engine on a tokio runtime.
use std::time::Duration;

use crate::engine::BingoEngine;
use crate::event::EngineEvent;
use crate::snapshot::CardStorage;
use crate::timer::Clock;

/// Sleep until the earliest overlay deadline. Returns `false` immediately
/// when nothing is pending.
pub async fn sleep_until_due<S, C>(engine: &BingoEngine<S, C>) -> bool
where
    S: CardStorage,
    C: Clock,
{
    let Some(deadline) = engine.next_deadline() else {
        return false;
    };
    let wait = deadline.saturating_sub(engine.clock().now());
    if wait > 0 {
        tokio::time::sleep(Duration::from_millis(wait)).await;
    }
    true
}

/// Poll through every pending deadline until all overlays are idle and
/// return the events produced along the way. The clock must advance on its
/// own (e.g. [`crate::SystemClock`]).
pub async fn settle<S, C>(engine: &mut BingoEngine<S, C>) -> Vec<EngineEvent>
where
    S: CardStorage,
    C: Clock,
{
    while sleep_until_due(engine).await {
        engine.poll();
    }
    engine.drain_events()
}
