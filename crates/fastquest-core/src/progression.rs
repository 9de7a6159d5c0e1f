//! Cumulative user counters and the level curve.
//!
//! `level` is never set directly: every change to `points` goes through
//! [`LevelCurve::level_for`] so the two cannot drift apart.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::achievements::AchievementId;
use crate::error::ConfigError;
use crate::session::SessionOutcome;

pub const DEFAULT_BASE_THRESHOLD: u64 = 200;
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;
/// Flatter curves need too many steps to reach large point totals.
pub const MIN_GROWTH_FACTOR: f64 = 1.01;

/// Geometric point curve: the first level-up costs `base_threshold` points,
/// each later one costs `ceil(previous * growth_factor)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelCurve {
    base_threshold: u64,
    growth_factor: f64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            base_threshold: DEFAULT_BASE_THRESHOLD,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

/// Where a user stands between two levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    pub points_into_level: u64,
    pub points_for_next_level: u64,
    /// 0.0 .. 1.0
    pub ratio: f64,
}

impl LevelCurve {
    /// # Errors
    /// Rejects a zero base and a growth factor that is not finite or is below
    /// [`MIN_GROWTH_FACTOR`].
    pub fn new(base_threshold: u64, growth_factor: f64) -> Result<Self, ConfigError> {
        if base_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "progression.base_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !growth_factor.is_finite() || growth_factor < MIN_GROWTH_FACTOR {
            return Err(ConfigError::InvalidValue {
                key: "progression.growth_factor".to_string(),
                message: format!("must be a finite number of at least {MIN_GROWTH_FACTOR}"),
            });
        }
        Ok(Self {
            base_threshold,
            growth_factor,
        })
    }

    pub fn base_threshold(&self) -> u64 {
        self.base_threshold
    }

    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// Per-level costs: 200, 300, 450, 675, ...
    ///
    /// Ends once a cost saturates `u64`.
    pub fn thresholds(&self) -> impl Iterator<Item = u64> {
        let growth = self.growth_factor;
        let mut next = Some(self.base_threshold);
        std::iter::from_fn(move || {
            let current = next?;
            let grown = (current as f64 * growth).ceil();
            next = if grown.is_finite() && grown < u64::MAX as f64 {
                Some((grown as u64).max(current))
            } else {
                None
            };
            Some(current)
        })
    }

    /// Minimum level is 1; monotonic non-decreasing in `points`.
    pub fn level_for(&self, points: u64) -> u32 {
        self.level_progress(points).level
    }

    pub fn level_progress(&self, points: u64) -> LevelProgress {
        let mut level: u32 = 1;
        let mut passed: u64 = 0;
        for threshold in self.thresholds() {
            match passed.checked_add(threshold) {
                Some(total) if total <= points => {
                    passed = total;
                    level = level.saturating_add(1);
                }
                _ => {
                    let into = points - passed;
                    return LevelProgress {
                        level,
                        points_into_level: into,
                        points_for_next_level: threshold - into,
                        ratio: into as f64 / threshold as f64,
                    };
                }
            }
        }
        LevelProgress {
            level,
            points_into_level: points - passed,
            points_for_next_level: 0,
            ratio: 1.0,
        }
    }
}

/// Durable per-user counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    points: u64,
    level: u32,
    current_streak: u32,
    total_fasts: u32,
    unlocked_achievements: BTreeSet<AchievementId>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            points: 0,
            level: 1,
            current_streak: 0,
            total_fasts: 0,
            unlocked_achievements: BTreeSet::new(),
        }
    }
}

impl UserProgress {
    /// Build from raw counters, deriving `level` from `points`.
    pub fn from_counters(
        points: u64,
        current_streak: u32,
        total_fasts: u32,
        unlocked_achievements: BTreeSet<AchievementId>,
        curve: &LevelCurve,
    ) -> Self {
        Self {
            points,
            level: curve.level_for(points),
            current_streak,
            total_fasts,
            unlocked_achievements,
        }
    }

    /// Rebuild from persisted columns. The stored level is kept as-is until
    /// the caller reconciles it against the active curve.
    pub(crate) fn from_stored(
        points: u64,
        level: u32,
        current_streak: u32,
        total_fasts: u32,
        unlocked_achievements: BTreeSet<AchievementId>,
    ) -> Self {
        Self {
            points,
            level: level.max(1),
            current_streak,
            total_fasts,
            unlocked_achievements,
        }
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    pub fn total_fasts(&self) -> u32 {
        self.total_fasts
    }

    pub fn unlocked_achievements(&self) -> &BTreeSet<AchievementId> {
        &self.unlocked_achievements
    }

    pub fn has_unlocked(&self, id: &AchievementId) -> bool {
        self.unlocked_achievements.contains(id)
    }

    pub(crate) fn add_points(&mut self, amount: u64, curve: &LevelCurve) {
        self.points = self.points.saturating_add(amount);
        self.level = curve.level_for(self.points);
    }

    /// Returns false if the id was already present.
    pub(crate) fn unlock(&mut self, id: AchievementId) -> bool {
        self.unlocked_achievements.insert(id)
    }

    /// Re-derive `level` after loading from an untrusted source.
    pub(crate) fn reconcile(mut self, curve: &LevelCurve) -> Self {
        self.level = curve.level_for(self.points);
        self
    }
}

/// Applies session outcomes to user counters.
#[derive(Debug, Clone, Default)]
pub struct ProgressionEngine {
    curve: LevelCurve,
}

impl ProgressionEngine {
    pub fn new(curve: LevelCurve) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn compute_level(&self, points: u64) -> u32 {
        self.curve.level_for(points)
    }

    pub fn level_progress(&self, progress: &UserProgress) -> LevelProgress {
        self.curve.level_progress(progress.points)
    }

    /// Completion bumps streak and total and adds the reward; an abort zeroes
    /// the streak and nothing else.
    pub fn apply_outcome(&self, progress: &UserProgress, outcome: &SessionOutcome) -> UserProgress {
        let mut next = progress.clone();
        match outcome {
            SessionOutcome::Completed { reward, .. } => {
                next.total_fasts = next.total_fasts.saturating_add(1);
                next.current_streak = next.current_streak.saturating_add(1);
                next.add_points(*reward, &self.curve);
            }
            SessionOutcome::Aborted { .. } => {
                next.current_streak = 0;
            }
        }
        next
    }

    pub fn reconcile(&self, progress: UserProgress) -> UserProgress {
        progress.reconcile(&self.curve)
    }
}
