//! # FastQuest Core Library
//!
//! This library provides the core logic for FastQuest, a gamified
//! intermittent-fasting tracker. All operations are available through the
//! standalone `fastquest` CLI; any GUI is a thin layer over the same crate.
//!
//! ## Architecture
//!
//! - **Session Engine**: A wall-clock-anchored state machine for one fasting
//!   attempt. The caller invokes `tick()` periodically; elapsed time is always
//!   derived from the anchor, never accumulated.
//! - **Progression**: Points, streaks and a geometric level curve
//! - **Achievements**: A validated catalog evaluated against user counters
//! - **Storage**: SQLite-based progress/session/history and TOML configuration
//! - **Tracker**: Ties the engines to a store, a clock and a notification sink
//!
//! ## Key Components
//!
//! - [`FastingSession`]: Session state machine
//! - [`ProgressionEngine`]: Level curve and outcome accounting
//! - [`AchievementEngine`]: Unlock evaluation
//! - [`FastTracker`]: Per-user orchestration
//! - [`Database`]: Persistence
//! - [`Config`]: Application configuration management

pub mod achievements;
pub mod clock;
pub mod error;
pub mod events;
pub mod progression;
pub mod session;
pub mod social;
pub mod storage;
pub mod tracker;

pub use achievements::{
    AchievementCategory, AchievementDefinition, AchievementEngine, AchievementId,
    AchievementStatus, Catalog, Requirement, RequirementKind,
};
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use error::{CatalogError, ConfigError, CoreError, StoreError};
pub use events::{Event, NotificationSink, TracingSink};
pub use progression::{LevelCurve, LevelProgress, ProgressionEngine, UserProgress};
pub use session::{FastingSession, MetabolicPhase, SessionOutcome, SessionState};
pub use social::{Leaderboard, LeaderboardEntry, ShareCard};
pub use storage::{Config, Database, FinishStore, HistoryStore, ProgressStore, SessionStore};
pub use tracker::{FastTracker, FinishReport, TrackerSettings, TrackerSnapshot};
