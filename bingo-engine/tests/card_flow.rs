use bingo_engine::{
    BingoEngine, CardStorage, EngineConfig, EngineError, EngineEvent, Line, ManualClock,
    MemoryStorage, NotificationKind, NotificationPayload, ProfileSnapshot,
};

fn engine_with(
    config: EngineConfig,
    storage: &MemoryStorage,
    clock: &ManualClock,
) -> BingoEngine<MemoryStorage, ManualClock> {
    BingoEngine::open(config, storage.clone(), clock.clone()).unwrap()
}

fn notifications(events: &[EngineEvent]) -> Vec<NotificationKind> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::NotificationStateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

fn settle(engine: &mut BingoEngine<MemoryStorage, ManualClock>) -> Vec<EngineEvent> {
    while let Some(deadline) = engine.next_deadline() {
        engine.clock().set(deadline);
        engine.poll();
    }
    engine.drain_events()
}

#[test]
fn centre_mark_closes_four_lines_at_once() {
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(0);
    let config = EngineConfig::default_config()
        .with_profiles(["Martyn"])
        .with_grid(5, Some(0));
    let mut engine = engine_with(config, &storage, &clock);

    let setup = [10, 11, 13, 14, 2, 7, 17, 22, 6, 18, 24, 4, 8, 16, 20];
    for index in setup {
        let outcome = engine.mark_cell("Martyn", index).unwrap();
        assert!(outcome.newly_completed().is_empty(), "cell {index}");
    }
    let outcome = engine.mark_cell("Martyn", 12).unwrap();
    assert_eq!(
        outcome.newly_completed(),
        &[Line::Row(2), Line::Column(2), Line::Diagonal, Line::AntiDiagonal]
    );
    let profile = engine.profile("Martyn").unwrap();
    assert_eq!(profile.cursor().committed(), 4);
    assert_eq!(profile.score(), 17);

    let events = settle(&mut engine);
    let celebrations: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::NotificationStateChanged {
                payload: NotificationPayload::Celebration { lines, rewards },
                ..
            } => Some((lines.len(), rewards.len())),
            _ => None,
        })
        .collect();
    assert_eq!(celebrations, vec![(4, 4)]);
    assert_eq!(engine.current_reward("Martyn").unwrap(), "Ask a stranger for a selfie");
}

#[test]
fn reward_rotation_wraps_across_a_double_completion() {
    let storage = MemoryStorage::new();
    storage.insert("bingo.profile.Martyn", r#"{"rewardCursor": 5}"#);
    let clock = ManualClock::new(0);
    let mut engine = engine_with(EngineConfig::default_config(), &storage, &clock);
    assert_eq!(engine.current_reward("Martyn").unwrap(), "Dance on a table");

    for index in [0, 1, 2, 3, 9, 14, 19, 24] {
        engine.mark_cell("Martyn", index).unwrap();
    }
    let outcome = engine.mark_cell("Martyn", 4).unwrap();
    assert_eq!(outcome.newly_completed(), &[Line::Row(0), Line::Column(4)]);
    assert_eq!(engine.profile("Martyn").unwrap().cursor().committed(), 1);

    let events = engine.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::LineCompleted { new_cursor_reward, .. } if new_cursor_reward == "Do a shot of tequila"
    )));

    clock.advance(2_500);
    engine.poll();
    let events = engine.drain_events();
    let owed = events.iter().find_map(|event| match event {
        EngineEvent::NotificationStateChanged {
            payload: NotificationPayload::Celebration { rewards, .. },
            ..
        } => Some(rewards.clone()),
        _ => None,
    });
    assert_eq!(
        owed,
        Some(vec![
            "Dance on a table".to_string(),
            "Buy a round of shots".to_string()
        ])
    );
    assert_eq!(engine.current_reward("Martyn").unwrap(), "Dance on a table");
    engine.dismiss_notification("Martyn").unwrap();
    assert_eq!(engine.current_reward("Martyn").unwrap(), "Do a shot of tequila");
}

#[test]
fn unmark_and_remark_pays_out_again() {
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(0);
    let mut engine = engine_with(EngineConfig::default_config(), &storage, &clock);
    for index in [2, 7, 17, 22] {
        engine.mark_cell("Sarah", index).unwrap();
    }
    assert_eq!(
        engine.profile("Sarah").unwrap().ledger().iter().collect::<Vec<_>>(),
        vec![Line::Column(2)]
    );

    engine.unmark_cell("Sarah", 7).unwrap();
    let events = engine.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::CellUnmarked { index: 7, reopened, .. } if reopened == &vec![Line::Column(2)]
    )));
    assert!(engine.profile("Sarah").unwrap().ledger().is_empty());

    let outcome = engine.mark_cell("Sarah", 7).unwrap();
    assert_eq!(outcome.newly_completed(), &[Line::Column(2)]);
    assert_eq!(engine.profile("Sarah").unwrap().cursor().committed(), 2);

    // marking the same cell twice is not a second completion
    assert!(!engine.mark_cell("Sarah", 7).unwrap().has_update());
    assert_eq!(engine.profile("Sarah").unwrap().cursor().committed(), 2);
}

#[test]
fn ack_always_precedes_the_celebration() {
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(0);
    let mut engine = engine_with(EngineConfig::default_config(), &storage, &clock);
    for index in 0..5 {
        engine.mark_cell("Martyn", index).unwrap();
    }
    let events = settle(&mut engine);
    assert_eq!(
        notifications(&events),
        vec![
            NotificationKind::ShowingAck,
            NotificationKind::ShowingAck,
            NotificationKind::ShowingAck,
            NotificationKind::ShowingAck,
            NotificationKind::ShowingAck,
            NotificationKind::Idle,
            NotificationKind::ShowingCelebration,
            NotificationKind::Idle,
        ]
    );
    assert_eq!(clock_now(&engine), 7_500);
    assert_eq!(engine.current_reward("Martyn").unwrap(), "Do a shot of tequila");
    assert_eq!(engine.current_reward("Sarah").unwrap(), "Buy a round of shots");
}

fn clock_now(engine: &BingoEngine<MemoryStorage, ManualClock>) -> u64 {
    use bingo_engine::Clock;
    engine.clock().now()
}

#[test]
fn state_survives_a_reload() {
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(0);
    {
        let mut engine = engine_with(EngineConfig::default_config(), &storage, &clock);
        for index in [0, 6, 18, 24] {
            engine.mark_cell("Sarah", index).unwrap();
        }
        engine
            .set_grid_labels("Martyn", (0..25).map(|i| format!("cell {i}")).collect())
            .unwrap();
        // celebration still queued when the app goes away
        assert_eq!(engine.current_reward("Sarah").unwrap(), "Buy a round of shots");
    }

    let raw = storage.get("bingo.profile.Sarah").unwrap();
    let snapshot: ProfileSnapshot = serde_json::from_str(&raw).unwrap();
    assert_eq!(snapshot.completed_lines.len(), 1);
    assert!(raw.contains("\"diag:1\""));

    let engine = engine_with(EngineConfig::default_config(), &storage, &clock);
    let sarah = engine.profile("Sarah").unwrap();
    assert_eq!(sarah.score(), 5);
    assert!(sarah.ledger().contains(Line::Diagonal));
    assert_eq!(engine.current_reward("Sarah").unwrap(), "Do a shot of tequila");
    assert_eq!(
        engine.profile("Martyn").unwrap().labels().get(3),
        Some("cell 3")
    );
    assert!(engine.notification_state("Sarah").unwrap().is_idle());
}

#[test]
fn reward_edits_are_shared_and_persisted() {
    let storage = MemoryStorage::new();
    let clock = ManualClock::new(0);
    let mut engine = engine_with(EngineConfig::default_config(), &storage, &clock);
    engine
        .set_reward_list(vec!["sing".into(), "dance".into(), "pay".into()])
        .unwrap();
    assert_eq!(engine.current_reward("Martyn").unwrap(), "sing");
    assert_eq!(engine.current_reward("Sarah").unwrap(), "sing");
    assert_eq!(
        storage.get("bingo.rewards").as_deref(),
        Some(r#"{"rewardList":["sing","dance","pay"]}"#)
    );
    let reopened = engine_with(EngineConfig::default_config(), &storage, &clock);
    assert_eq!(reopened.reward_list().len(), 3);
}

#[test]
fn reward_edits_during_an_open_celebration_still_catch_up() {
    let storage = MemoryStorage::new();
    storage.insert("bingo.profile.Martyn", r#"{"rewardCursor": 5}"#);
    let clock = ManualClock::new(0);
    let mut engine = engine_with(EngineConfig::default_config(), &storage, &clock);
    for index in [0, 1, 2, 3, 9, 14, 19, 24, 4] {
        engine.mark_cell("Martyn", index).unwrap();
    }
    let cursor = *engine.profile("Martyn").unwrap().cursor();
    assert_eq!((cursor.committed(), cursor.revealed()), (1, 5));

    // celebration still queued behind the acknowledgement
    engine
        .set_reward_list(vec!["a".into(), "b".into(), "c".into(), "d".into()])
        .unwrap();
    let cursor = *engine.profile("Martyn").unwrap().cursor();
    assert_eq!(cursor.committed(), 1);
    assert_eq!(cursor.pending(4), 2);

    settle(&mut engine);
    let cursor = *engine.profile("Martyn").unwrap().cursor();
    assert_eq!(cursor.revealed(), cursor.committed());
    assert_eq!(engine.current_reward("Martyn").unwrap(), "b");

    // and again while the celebration is on screen
    for index in [5, 6, 7, 8] {
        engine.mark_cell("Martyn", index).unwrap();
    }
    clock.advance(2_500);
    engine.poll();
    assert_eq!(
        engine.notification_state("Martyn").unwrap().kind(),
        NotificationKind::ShowingCelebration
    );
    engine
        .set_reward_list(vec!["sing".into(), "dance".into(), "pay".into()])
        .unwrap();
    engine.dismiss_notification("Martyn").unwrap();
    let cursor = *engine.profile("Martyn").unwrap().cursor();
    assert_eq!(cursor.revealed(), cursor.committed());
    assert_eq!(engine.current_reward("Martyn").unwrap(), "pay");
}

#[derive(Debug, Clone, Copy, Default)]
struct OfflineStorage;

impl CardStorage for OfflineStorage {
    type Error = std::io::Error;

    fn read(&self, _key: &str) -> Result<Option<String>, Self::Error> {
        Err(std::io::Error::other("storage offline"))
    }

    fn write(&self, _key: &str, _value: &str) -> Result<(), Self::Error> {
        Err(std::io::Error::other("storage offline"))
    }

    fn remove(&self, _key: &str) -> Result<(), Self::Error> {
        Err(std::io::Error::other("storage offline"))
    }
}

#[test]
fn storage_failures_are_reported_not_raised() {
    let mut engine = BingoEngine::open(
        EngineConfig::default_config().with_profiles(["Martyn"]),
        OfflineStorage,
        ManualClock::new(0),
    )
    .unwrap();
    assert!(
        engine
            .drain_events()
            .iter()
            .all(|event| matches!(event, EngineEvent::Warning { .. }))
    );

    engine.mark_cell("Martyn", 0).unwrap();
    let events = engine.drain_events();
    assert!(matches!(events[0], EngineEvent::CellMarked { index: 0, .. }));
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::Warning { message, .. } if message.contains("storage offline")
    )));
    assert_eq!(engine.score("Martyn").unwrap(), 2);
    assert_eq!(
        engine.set_reward_list(Vec::new()),
        Err(EngineError::EmptyRewardList)
    );
}

/// Reads fail while writes still land in the wrapped store.
#[derive(Debug, Clone, Default)]
struct UnreadableStorage(MemoryStorage);

impl CardStorage for UnreadableStorage {
    type Error = std::io::Error;

    fn read(&self, _key: &str) -> Result<Option<String>, Self::Error> {
        Err(std::io::Error::other("read failed"))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.0.insert(key, value);
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[test]
fn unreadable_records_are_only_written_by_the_next_edit() {
    let storage = UnreadableStorage::default();
    let mut engine = BingoEngine::open(
        EngineConfig::default_config().with_profiles(["Martyn"]),
        storage.clone(),
        ManualClock::new(0),
    )
    .unwrap();
    assert!(storage.0.keys().is_empty(), "open must not overwrite");

    engine.mark_cell("Martyn", 0).unwrap();
    assert_eq!(storage.0.keys(), vec!["bingo.profile.Martyn"]);
    engine.set_reward_list(vec!["sing".into()]).unwrap();
    assert_eq!(
        storage.0.get("bingo.rewards").as_deref(),
        Some(r#"{"rewardList":["sing"]}"#)
    );
}
