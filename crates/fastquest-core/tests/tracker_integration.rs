//! End-to-end tests for the tracker: session transitions, progression,
//! achievements and persistence working together.

use std::cell::RefCell;

use chrono::{DateTime, Duration, TimeZone, Utc};
use fastquest_core::storage::FinishedFast;
use fastquest_core::{
    AchievementId, Config, CoreError, Database, Event, FastTracker, FastingSession, FinishStore,
    HistoryStore, ManualClock, ProgressStore, SessionOutcome, SessionState, SessionStore,
    StoreError, TrackerSettings, UserProgress,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 20, 0, 0).unwrap()
}

type Events = RefCell<Vec<Event>>;

fn tracker<'a>(
    db: &'a Database,
    clock: &'a ManualClock,
    events: &'a Events,
) -> FastTracker<&'a Database, &'a ManualClock, &'a Events> {
    FastTracker::activate("ana", db, clock, events, TrackerSettings::default())
}

#[test]
fn completed_sixteen_hour_fast() {
    let db = Database::open_memory().unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();
    let mut t = tracker(&db, &clock, &events);

    t.start(Some(16)).unwrap();
    clock.advance(Duration::hours(16));
    t.tick();
    assert_eq!(t.session().elapsed_seconds(), 16 * 3600);

    let report = t.finish().unwrap();
    assert!(matches!(report.outcome, SessionOutcome::Completed { reward: 160, .. }));
    assert_eq!(report.unlocked, vec![AchievementId::new("first_fast")]);
    assert_eq!(report.achievement_points, 50);

    let progress = t.progress();
    assert_eq!(progress.total_fasts(), 1);
    assert_eq!(progress.current_streak(), 1);
    assert_eq!(progress.points(), 210);
    assert_eq!(progress.level(), 2);
    assert_eq!(report.level_before, 1);
    assert_eq!(report.level_after, 2);
    assert_eq!(t.session().state(), SessionState::Idle);
    assert_eq!(t.session().target_hours(), 16);

    // Persisted.
    let stored = db.load("ana").unwrap().unwrap();
    assert_eq!(&stored, t.progress());
    assert_eq!(db.load_session("ana").unwrap().unwrap().state(), SessionState::Idle);
    assert_eq!(db.stats("ana").unwrap().completed, 1);

    let events = events.borrow();
    assert!(events.iter().any(|e| matches!(e, Event::TargetReached { .. })));
    assert!(events.iter().any(|e| matches!(e, Event::SessionCompleted { reward: 160, .. })));
    assert!(events.iter().any(|e| matches!(e, Event::AchievementUnlocked { reward: 50, .. })));
    assert!(events.iter().any(|e| matches!(e, Event::LevelUp { from: 1, to: 2, .. })));
}

#[test]
fn aborted_fast_resets_streak() {
    let db = Database::open_memory().unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();
    let mut t = tracker(&db, &clock, &events);

    // Two good fasts first.
    for _ in 0..2 {
        t.start(Some(12)).unwrap();
        clock.advance(Duration::hours(12));
        t.finish().unwrap();
        clock.advance(Duration::hours(12));
    }
    assert_eq!(t.progress().current_streak(), 2);
    let points_before = t.progress().points();

    t.start(Some(16)).unwrap();
    clock.advance(Duration::hours(8));
    t.tick();
    let report = t.finish().unwrap();

    assert!(matches!(report.outcome, SessionOutcome::Aborted { elapsed_seconds: 28_800, .. }));
    assert!(report.unlocked.is_empty());
    assert_eq!(t.progress().current_streak(), 0);
    assert_eq!(t.progress().total_fasts(), 2);
    assert_eq!(t.progress().points(), points_before);
    assert!(events
        .borrow()
        .iter()
        .any(|e| matches!(e, Event::SessionAborted { .. })));
}

#[test]
fn pause_and_resume_preserve_elapsed() {
    let db = Database::open_memory().unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();
    let mut t = tracker(&db, &clock, &events);

    t.start(Some(16)).unwrap();
    clock.advance(Duration::hours(3));
    t.tick();
    t.pause().unwrap();
    let frozen = t.session().elapsed_seconds();
    assert_eq!(frozen, 3 * 3600);

    clock.advance(Duration::hours(6));
    t.tick();
    assert_eq!(t.session().elapsed_seconds(), frozen);

    assert!(matches!(t.start(None), Ok(Event::SessionResumed { .. })));
    t.tick();
    assert_eq!(t.session().elapsed_seconds(), frozen);
    clock.advance(Duration::minutes(30));
    t.tick();
    assert_eq!(t.session().elapsed_seconds(), frozen + 1800);
}

#[test]
fn running_session_survives_restart() {
    let db = Database::open_memory().unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();

    {
        let mut t = tracker(&db, &clock, &events);
        t.start(Some(16)).unwrap();
        clock.advance(Duration::minutes(10));
        t.tick();
    }

    // Process was gone for a while.
    clock.advance(Duration::hours(17));
    let mut t = tracker(&db, &clock, &events);
    assert_eq!(t.session().state(), SessionState::Running);
    assert_eq!(t.session().elapsed_seconds(), 17 * 3600 + 600);

    let report = t.finish().unwrap();
    assert!(report.outcome.is_completed());
    assert_eq!(report.outcome.reward(), 170);
}

#[test]
fn invalid_commands_are_rejected_and_reported() {
    let db = Database::open_memory().unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();
    let mut t = tracker(&db, &clock, &events);

    assert!(matches!(t.pause(), Err(CoreError::InvalidTransition { .. })));
    assert!(matches!(t.finish(), Err(CoreError::InvalidTransition { .. })));
    assert!(matches!(t.start(Some(0)), Err(CoreError::InvalidTarget { .. })));

    t.start(Some(16)).unwrap();
    let before = t.session().clone();
    assert!(matches!(t.start(Some(16)), Err(CoreError::InvalidTransition { .. })));
    assert!(matches!(t.set_target(20), Err(CoreError::InvalidTransition { .. })));
    assert_eq!(t.session(), &before);

    let rejected = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::ActionRejected { .. }))
        .count();
    assert_eq!(rejected, 5);
}

#[test]
fn achievements_unlock_exactly_once() {
    let db = Database::open_memory().unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();
    let mut t = tracker(&db, &clock, &events);

    let first = AchievementId::new("first_fast");
    let mut unlocked_first = 0;
    for _ in 0..2 {
        t.start(Some(12)).unwrap();
        clock.advance(Duration::hours(12));
        let report = t.finish().unwrap();
        unlocked_first += report.unlocked.iter().filter(|id| **id == first).count();
    }
    assert_eq!(unlocked_first, 1);
    assert_eq!(t.progress().total_fasts(), 2);
    // 2 * 120 from fasts + 50 from first_fast.
    assert_eq!(t.progress().points(), 290);
}

/// Every operation fails.
struct BrokenStore;

impl ProgressStore for BrokenStore {
    fn load(&self, _user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        Err(StoreError::Locked)
    }
    fn save(&self, _user_id: &str, _progress: &UserProgress) -> Result<(), StoreError> {
        Err(StoreError::Locked)
    }
}

impl SessionStore for BrokenStore {
    fn load_session(&self, _user_id: &str) -> Result<Option<FastingSession>, StoreError> {
        Err(StoreError::Query("disk on fire".into()))
    }
    fn save_session(&self, _user_id: &str, _session: &FastingSession) -> Result<(), StoreError> {
        Err(StoreError::Locked)
    }
}

impl HistoryStore for BrokenStore {
    fn record_fast(&self, _user_id: &str, _fast: &FinishedFast) -> Result<i64, StoreError> {
        Err(StoreError::Locked)
    }
}

impl FinishStore for BrokenStore {}

#[test]
fn unavailable_store_falls_back_and_warns() {
    let clock = ManualClock::new(t0());
    let events = Events::default();
    let mut t = FastTracker::activate("ana", BrokenStore, &clock, &events, TrackerSettings::default());

    assert_eq!(t.progress(), &UserProgress::default());
    assert_eq!(t.session().state(), SessionState::Idle);

    t.start(Some(1)).unwrap();
    clock.advance(Duration::hours(1));
    let report = t.finish().unwrap();
    assert!(report.outcome.is_completed());
    // In-memory state stays authoritative.
    assert_eq!(t.progress().total_fasts(), 1);

    let warnings = events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::StoreWarning { .. }))
        .count();
    // 2 loads, start save, one combined finish write.
    assert_eq!(warnings, 4);
}

#[test]
fn on_disk_database_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fastquest.db");
    let clock = ManualClock::new(t0());
    let events = Events::default();

    {
        let db = Database::open_at(&path).unwrap();
        let mut t = tracker(&db, &clock, &events);
        t.start(Some(14)).unwrap();
        clock.advance(Duration::hours(15));
        t.finish().unwrap();
    }

    let db = Database::open_at(&path).unwrap();
    let t = tracker(&db, &clock, &events);
    assert_eq!(t.progress().total_fasts(), 1);
    assert!(t.progress().has_unlocked(&AchievementId::new("first_fast")));
    assert_eq!(db.history("ana", 5).unwrap().len(), 1);
}

fn warnings(events: &Events) -> usize {
    events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::StoreWarning { .. }))
        .count()
}

#[test]
fn out_of_range_elapsed_in_store_falls_back_to_idle() {
    let db = Database::open_memory().unwrap();
    db.kv_set(
        "session:ana",
        r#"{"state":"paused","target_seconds":57600,"elapsed_seconds":18446744073709551615}"#,
    )
    .unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();

    let mut t = tracker(&db, &clock, &events);
    assert_eq!(t.session().state(), SessionState::Idle);
    assert_eq!(t.session().elapsed_seconds(), 0);
    assert_eq!(warnings(&events), 1);

    t.start(None).unwrap();
    clock.advance(Duration::hours(2));
    t.tick();
    assert_eq!(t.session().elapsed_seconds(), 2 * 3600);
    assert_eq!(db.load_session("ana").unwrap().unwrap().state(), SessionState::Running);
}

#[test]
fn running_session_without_anchor_is_discarded() {
    let db = Database::open_memory().unwrap();
    db.kv_set(
        "session:ana",
        r#"{"state":"running","target_seconds":57600,"elapsed_seconds":0}"#,
    )
    .unwrap();
    let clock = ManualClock::new(t0());
    let events = Events::default();

    let mut t = tracker(&db, &clock, &events);
    assert_eq!(t.session().state(), SessionState::Idle);
    assert_eq!(warnings(&events), 1);

    t.start(Some(16)).unwrap();
    clock.advance(Duration::hours(5));
    t.tick();
    assert_eq!(t.session().state(), SessionState::Running);
    assert_eq!(t.session().elapsed_seconds(), 5 * 3600);
}

#[test]
fn settings_from_invalid_config_name_the_cause() {
    let mut flat = Config::default();
    flat.progression.growth_factor = 1.0;
    assert!(matches!(
        TrackerSettings::from_config(&flat),
        Err(CoreError::Config(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let mut missing_catalog = Config::default();
    missing_catalog.achievements.catalog_path = Some(dir.path().join("nope.toml"));
    assert!(matches!(
        TrackerSettings::from_config(&missing_catalog),
        Err(CoreError::Catalog(_))
    ));

    let settings = TrackerSettings::from_config(&Config::default()).unwrap();
    assert_eq!(settings.default_target_hours, 16);
    assert_eq!(settings.points_per_hour, 10);
}
