//! Fasting session state machine.
//!
//! Elapsed time is always derived from an absolute anchor (`start_epoch`),
//! never accumulated per tick, so suspending the host process or ticking at an
//! irregular rate does not change the result for a given `now`.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running | Paused --finish--> Completed | Aborted --> Idle
//! ```
//!
//! Completed and Aborted are outcomes, not resting states: `finish()` folds
//! straight back to `Idle` and reports the outcome to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::MetabolicPhase;
use crate::error::{CoreError, Result};
use crate::events::Event;

const SECS_PER_HOUR: u64 = 3600;

/// Largest elapsed value a chrono duration can hold.
const MAX_ELAPSED_SECONDS: u64 = i64::MAX as u64 / 1000;

pub const DEFAULT_TARGET_HOURS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Result of `finish()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed {
        elapsed_seconds: u64,
        target_seconds: u64,
        reward: u64,
    },
    Aborted {
        elapsed_seconds: u64,
        target_seconds: u64,
    },
}

impl SessionOutcome {
    pub fn elapsed_seconds(&self) -> u64 {
        match self {
            SessionOutcome::Completed { elapsed_seconds, .. }
            | SessionOutcome::Aborted { elapsed_seconds, .. } => *elapsed_seconds,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed { .. })
    }

    pub fn reward(&self) -> u64 {
        match self {
            SessionOutcome::Completed { reward, .. } => *reward,
            SessionOutcome::Aborted { .. } => 0,
        }
    }
}

/// Point snapshot of a session for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub target_hours: u32,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    pub progress: f64,
    pub phase: MetabolicPhase,
    pub phase_label: String,
    pub phase_description: String,
    pub elapsed_display: String,
}

/// A single fasting attempt.
///
/// Serializes in full so a running session survives process restarts; on
/// reload the caller must `tick(now)` before reading `elapsed_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastingSession {
    state: SessionState,
    target_seconds: u64,
    elapsed_seconds: u64,
    /// Present iff `state == Running`. Elapsed = now - start_epoch.
    #[serde(default)]
    start_epoch: Option<DateTime<Utc>>,
    /// When this attempt was first started; kept across pauses.
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    target_reached: bool,
}

impl Default for FastingSession {
    fn default() -> Self {
        Self::idle(DEFAULT_TARGET_HOURS)
    }
}

impl FastingSession {
    /// Create an idle session with the given default target.
    ///
    /// # Errors
    /// Returns `InvalidTarget` when `target_hours` is zero.
    pub fn new(target_hours: u32) -> Result<Self> {
        validate_target(target_hours)?;
        Ok(Self::idle(target_hours))
    }

    fn idle(target_hours: u32) -> Self {
        Self {
            state: SessionState::Idle,
            target_seconds: u64::from(target_hours) * SECS_PER_HOUR,
            elapsed_seconds: 0,
            start_epoch: None,
            started_at: None,
            target_reached: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != SessionState::Idle
    }

    pub fn target_seconds(&self) -> u64 {
        self.target_seconds
    }

    pub fn target_hours(&self) -> u32 {
        u32::try_from(self.target_seconds / SECS_PER_HOUR).unwrap_or(u32::MAX)
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn start_epoch(&self) -> Option<DateTime<Utc>> {
        self.start_epoch
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.target_seconds.saturating_sub(self.elapsed_seconds)
    }

    /// 0.0 ..= 1.0, capped once the target is reached.
    pub fn progress(&self) -> f64 {
        if self.target_seconds == 0 {
            return 0.0;
        }
        (self.elapsed_seconds as f64 / self.target_seconds as f64).min(1.0)
    }

    pub fn phase(&self) -> MetabolicPhase {
        MetabolicPhase::from_elapsed(self.elapsed_seconds)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let phase = self.phase();
        SessionSnapshot {
            state: self.state,
            target_hours: self.target_hours(),
            elapsed_seconds: self.elapsed_seconds,
            remaining_seconds: self.remaining_seconds(),
            progress: self.progress(),
            phase,
            phase_label: phase.label().to_string(),
            phase_description: phase.description().to_string(),
            elapsed_display: format_hms(self.elapsed_seconds),
        }
    }

    /// Check the invariants a decoded session must hold before it is used.
    ///
    /// # Errors
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let running = self.state == SessionState::Running;
        if running != self.start_epoch.is_some() {
            return Err(format!(
                "state {} with start_epoch {}",
                self.state,
                if self.start_epoch.is_some() { "set" } else { "missing" }
            ));
        }
        if self.target_seconds == 0 {
            return Err("target_seconds must be positive".to_string());
        }
        if self.elapsed_seconds > MAX_ELAPSED_SECONDS {
            return Err(format!("elapsed_seconds {} out of range", self.elapsed_seconds));
        }
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Change the default target. Only allowed while idle.
    pub fn set_target(&mut self, target_hours: u32, now: DateTime<Utc>) -> Result<Event> {
        validate_target(target_hours)?;
        if self.state != SessionState::Idle {
            return Err(self.invalid("change the target"));
        }
        self.target_seconds = u64::from(target_hours) * SECS_PER_HOUR;
        Ok(Event::TargetChanged { target_hours, at: now })
    }

    /// Start a new attempt from `Idle`, or resume from `Paused`.
    ///
    /// Resuming keeps prior elapsed time by anchoring `start_epoch` that many
    /// seconds in the past. The target is locked while paused, so a resume
    /// must ask for the same target.
    pub fn start(&mut self, target_hours: u32, now: DateTime<Utc>) -> Result<Event> {
        validate_target(target_hours)?;
        let target_seconds = u64::from(target_hours) * SECS_PER_HOUR;
        match self.state {
            SessionState::Running => Err(self.invalid("start")),
            SessionState::Paused if target_seconds != self.target_seconds => {
                Err(self.invalid("change the target"))
            }
            SessionState::Paused => {
                self.start_epoch = Some(anchor(now, self.elapsed_seconds));
                self.state = SessionState::Running;
                Ok(Event::SessionResumed {
                    elapsed_seconds: self.elapsed_seconds,
                    at: now,
                })
            }
            SessionState::Idle => {
                self.target_seconds = target_seconds;
                self.start_epoch = Some(anchor(now, self.elapsed_seconds));
                self.started_at = Some(now);
                self.target_reached = false;
                self.state = SessionState::Running;
                Ok(Event::SessionStarted { target_hours, at: now })
            }
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<Event> {
        if self.state != SessionState::Running {
            return Err(self.invalid("pause"));
        }
        self.flush_elapsed(now);
        self.start_epoch = None;
        self.state = SessionState::Paused;
        Ok(Event::SessionPaused {
            elapsed_seconds: self.elapsed_seconds,
            at: now,
        })
    }

    /// Recompute elapsed time from the anchor. Returns
    /// `Some(Event::TargetReached)` the first time the target is crossed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != SessionState::Running {
            return None;
        }
        self.flush_elapsed(now);
        if !self.target_reached && self.elapsed_seconds >= self.target_seconds {
            self.target_reached = true;
            return Some(Event::TargetReached {
                target_hours: self.target_hours(),
                at: now,
            });
        }
        None
    }

    /// End the attempt. Completed iff elapsed reached the target.
    ///
    /// The session returns to `Idle` with elapsed reset; the target is kept as
    /// the default for the next attempt.
    pub fn finish(&mut self, now: DateTime<Utc>, points_per_hour: u64) -> Result<SessionOutcome> {
        match self.state {
            SessionState::Idle => return Err(self.invalid("finish")),
            SessionState::Running => self.flush_elapsed(now),
            SessionState::Paused => {}
        }

        let elapsed_seconds = self.elapsed_seconds;
        let target_seconds = self.target_seconds;
        let outcome = if elapsed_seconds >= target_seconds {
            SessionOutcome::Completed {
                elapsed_seconds,
                target_seconds,
                reward: completion_reward(elapsed_seconds, points_per_hour),
            }
        } else {
            SessionOutcome::Aborted {
                elapsed_seconds,
                target_seconds,
            }
        };

        self.state = SessionState::Idle;
        self.elapsed_seconds = 0;
        self.start_epoch = None;
        self.started_at = None;
        self.target_reached = false;
        Ok(outcome)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Elapsed never decreases, even if the wall clock steps backwards.
    fn flush_elapsed(&mut self, now: DateTime<Utc>) {
        if let Some(start) = self.start_epoch {
            let delta = (now - start).num_seconds().max(0) as u64;
            self.elapsed_seconds = self.elapsed_seconds.max(delta);
        }
    }

    fn invalid(&self, operation: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            operation,
            state: self.state.to_string(),
        }
    }
}

/// `floor(hours) * points_per_hour`.
pub fn completion_reward(elapsed_seconds: u64, points_per_hour: u64) -> u64 {
    (elapsed_seconds / SECS_PER_HOUR).saturating_mul(points_per_hour)
}

/// `HH:MM:SS`; hours are not wrapped.
pub fn format_hms(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

fn validate_target(target_hours: u32) -> Result<()> {
    if target_hours == 0 {
        return Err(CoreError::InvalidTarget { hours: target_hours });
    }
    Ok(())
}

/// `now - elapsed`, clamped to the earliest representable instant.
fn anchor(now: DateTime<Utc>, elapsed_seconds: u64) -> DateTime<Utc> {
    i64::try_from(elapsed_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|elapsed| now.checked_sub_signed(elapsed))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
