//! Per-user orchestration of the engines.
//!
//! Control flow on every command: the session engine transitions, then (on
//! finish) progression applies the outcome, the achievement engine runs, and
//! the store persists the new snapshot. Validation failures are reported to
//! the sink and returned without touching state. Store failures never
//! propagate: loads fall back to defaults, saves degrade to a warning and the
//! in-memory state stays authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::{AchievementEngine, AchievementId, Catalog};
use crate::clock::TimeSource;
use crate::error::{CoreError, Result, StoreError};
use crate::events::{Event, NotificationSink};
use crate::progression::{LevelCurve, LevelProgress, ProgressionEngine, UserProgress};
use crate::session::{FastingSession, SessionOutcome, SessionSnapshot};
use crate::storage::{Config, FinishStore, FinishedFast, ProgressStore, SessionStore};

/// Tuning knobs handed to a tracker.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub curve: LevelCurve,
    pub catalog: Catalog,
    pub points_per_hour: u64,
    pub default_target_hours: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        let fasting = Config::default().fasting;
        Self {
            curve: LevelCurve::default(),
            catalog: Catalog::builtin(),
            points_per_hour: fasting.points_per_hour,
            default_target_hours: fasting.default_target_hours,
        }
    }
}

impl TrackerSettings {
    /// # Errors
    /// Fails if the configured level curve is invalid, or the configured
    /// catalog cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            curve: config.level_curve()?,
            catalog: config.catalog()?,
            points_per_hour: config.fasting.points_per_hour,
            default_target_hours: config.fasting.default_target_hours,
        })
    }
}

/// What `finish()` did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishReport {
    pub outcome: SessionOutcome,
    pub unlocked: Vec<AchievementId>,
    pub achievement_points: u64,
    pub level_before: u32,
    pub level_after: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub user_id: String,
    pub session: SessionSnapshot,
    pub progress: UserProgress,
    pub level: LevelProgress,
    pub at: DateTime<Utc>,
}

/// One user's live fasting state plus the collaborators it reports to.
pub struct FastTracker<S, C, N> {
    user_id: String,
    store: S,
    clock: C,
    sink: N,
    session: FastingSession,
    progress: UserProgress,
    progression: ProgressionEngine,
    achievements: AchievementEngine,
    points_per_hour: u64,
}

impl<S, C, N> FastTracker<S, C, N>
where
    S: FinishStore,
    C: TimeSource,
    N: NotificationSink,
{
    /// Load the user's progress and session and bring the session up to
    /// `now`. A running session resumes from its persisted anchor, so time
    /// spent while the process was gone still counts.
    pub fn activate(
        user_id: impl Into<String>,
        store: S,
        clock: C,
        sink: N,
        settings: TrackerSettings,
    ) -> Self {
        let user_id = user_id.into();
        let progression = ProgressionEngine::new(settings.curve);
        let achievements = AchievementEngine::new(settings.catalog, settings.curve);

        let mut tracker = Self {
            user_id,
            store,
            clock,
            sink,
            session: FastingSession::new(settings.default_target_hours).unwrap_or_default(),
            progress: UserProgress::default(),
            progression,
            achievements,
            points_per_hour: settings.points_per_hour,
        };

        match tracker.store.load(&tracker.user_id) {
            Ok(Some(progress)) => tracker.progress = tracker.progression.reconcile(progress),
            Ok(None) => tracing::debug!(user = %tracker.user_id, "no stored progress, starting fresh"),
            Err(e) => tracker.store_warning("load progress", &e),
        }
        match tracker.store.load_session(&tracker.user_id) {
            Ok(Some(session)) => tracker.session = session,
            Ok(None) => {}
            Err(e) => tracker.store_warning("load session", &e),
        }

        tracing::info!(
            user = %tracker.user_id,
            state = %tracker.session.state(),
            points = tracker.progress.points(),
            "tracker activated"
        );
        tracker.tick();
        tracker
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session(&self) -> &FastingSession {
        &self.session
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn achievements(&self) -> &AchievementEngine {
        &self.achievements
    }

    pub fn progression(&self) -> &ProgressionEngine {
        &self.progression
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            user_id: self.user_id.clone(),
            session: self.session.snapshot(),
            progress: self.progress.clone(),
            level: self.progression.level_progress(&self.progress),
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start (from idle) or resume (from paused). `None` uses the session's
    /// current target.
    pub fn start(&mut self, target_hours: Option<u32>) -> Result<Event> {
        let now = self.clock.now();
        let hours = target_hours.unwrap_or_else(|| self.session.target_hours());
        let result = self.session.start(hours, now);
        self.after_transition(result)
    }

    pub fn pause(&mut self) -> Result<Event> {
        let now = self.clock.now();
        let result = self.session.pause(now);
        self.after_transition(result)
    }

    pub fn set_target(&mut self, target_hours: u32) -> Result<Event> {
        let now = self.clock.now();
        let result = self.session.set_target(target_hours, now);
        self.after_transition(result)
    }

    /// Advance elapsed time to `now`. Not a transition: only persists when
    /// the target is crossed.
    pub fn tick(&mut self) -> Option<Event> {
        let now = self.clock.now();
        let event = self.session.tick(now);
        tracing::debug!(elapsed = self.session.elapsed_seconds(), "tick");
        if let Some(ref event) = event {
            self.sink.notify(event);
            self.persist_session();
        }
        event
    }

    pub fn finish(&mut self) -> Result<FinishReport> {
        let now = self.clock.now();
        let started_at = self.session.started_at();
        let outcome = match self.session.finish(now, self.points_per_hour) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.reject(e)),
        };

        let level_before = self.progress.level();
        let counted = self.progression.apply_outcome(&self.progress, &outcome);
        let evaluation = self.achievements.evaluate(&counted);
        self.progress = evaluation.progress;
        let level_after = self.progress.level();

        match outcome {
            SessionOutcome::Completed {
                elapsed_seconds,
                reward,
                ..
            } => {
                tracing::info!(user = %self.user_id, elapsed_seconds, reward, "fast completed");
                self.sink.notify(&Event::SessionCompleted {
                    elapsed_seconds,
                    reward,
                    at: now,
                });
            }
            SessionOutcome::Aborted {
                elapsed_seconds,
                target_seconds,
            } => {
                tracing::info!(user = %self.user_id, elapsed_seconds, target_seconds, "fast aborted");
                self.sink.notify(&Event::SessionAborted {
                    elapsed_seconds,
                    target_seconds,
                    at: now,
                });
            }
        }

        for id in &evaluation.newly_unlocked {
            if let Some(def) = self.achievements.catalog().get(id) {
                tracing::info!(user = %self.user_id, achievement = %id, reward = def.point_reward, "achievement unlocked");
                self.sink.notify(&Event::AchievementUnlocked {
                    id: id.clone(),
                    title: def.title.clone(),
                    reward: def.point_reward,
                    at: now,
                });
            }
        }
        if level_after > level_before {
            self.sink.notify(&Event::LevelUp {
                from: level_before,
                to: level_after,
                at: now,
            });
        }

        let fast = FinishedFast {
            outcome,
            started_at,
            finished_at: now,
        };
        if let Err(e) = self
            .store
            .commit_finish(&self.user_id, &self.session, &self.progress, &fast)
        {
            self.store_warning("save finished fast", &e);
        }

        Ok(FinishReport {
            outcome,
            unlocked: evaluation.newly_unlocked,
            achievement_points: evaluation.points_awarded,
            level_before,
            level_after,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn after_transition(&mut self, result: Result<Event>) -> Result<Event> {
        match result {
            Ok(event) => {
                tracing::info!(user = %self.user_id, state = %self.session.state(), "session transition");
                self.sink.notify(&event);
                self.persist_session();
                Ok(event)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    fn reject(&self, err: CoreError) -> CoreError {
        tracing::debug!(user = %self.user_id, error = %err, "command rejected");
        self.sink.notify(&Event::ActionRejected {
            reason: err.to_string(),
            at: self.clock.now(),
        });
        err
    }

    fn persist_session(&self) {
        if let Err(e) = self.store.save_session(&self.user_id, &self.session) {
            self.store_warning("save session", &e);
        }
    }

    fn store_warning(&self, action: &str, err: &StoreError) {
        tracing::warn!(user = %self.user_id, action, error = %err, "store unavailable");
        self.sink.notify(&Event::StoreWarning {
            message: format!("{action}: {err}"),
            at: self.clock.now(),
        });
    }
}
