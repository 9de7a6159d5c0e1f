use serde::{Deserialize, Serialize};

use super::catalog::{
    AchievementCategory, AchievementDefinition, AchievementId, Catalog, RequirementKind,
};
use crate::progression::{LevelCurve, UserProgress};

/// Result of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub progress: UserProgress,
    pub newly_unlocked: Vec<AchievementId>,
    pub points_awarded: u64,
}

/// Display row for one achievement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementStatus {
    pub id: AchievementId,
    pub title: String,
    pub description: String,
    pub category: AchievementCategory,
    pub point_reward: u64,
    pub unlocked: bool,
    /// `min(current, threshold)`
    pub current: u64,
    pub threshold: u64,
    /// 0.0 .. 1.0
    pub ratio: f64,
}

/// Evaluates the catalog against user counters.
#[derive(Debug, Clone)]
pub struct AchievementEngine {
    catalog: Catalog,
    curve: LevelCurve,
}

impl AchievementEngine {
    pub fn new(catalog: Catalog, curve: LevelCurve) -> Self {
        Self { catalog, curve }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Unlock every achievement whose requirement is met.
    ///
    /// All requirements are checked against the counters as they were on
    /// entry; rewards are added in one batch at the end, so a reward cannot
    /// unlock a points achievement within the same pass. Calling this again
    /// without a counter change unlocks nothing.
    pub fn evaluate(&self, progress: &UserProgress) -> Evaluation {
        let mut newly_unlocked = Vec::new();
        let mut pending: u64 = 0;

        for def in self.catalog.achievements() {
            if progress.has_unlocked(&def.id) {
                continue;
            }
            if current_value(def.requirement.kind, progress) >= def.requirement.threshold {
                newly_unlocked.push(def.id.clone());
                pending = pending.saturating_add(def.point_reward);
            }
        }

        let mut next = progress.clone();
        for id in &newly_unlocked {
            next.unlock(id.clone());
        }
        next.add_points(pending, &self.curve);

        if !newly_unlocked.is_empty() {
            tracing::debug!(count = newly_unlocked.len(), points = pending, "achievements evaluated");
        }

        Evaluation {
            progress: next,
            newly_unlocked,
            points_awarded: pending,
        }
    }

    pub fn status(&self, def: &AchievementDefinition, progress: &UserProgress) -> AchievementStatus {
        let threshold = def.requirement.threshold;
        let unlocked = progress.has_unlocked(&def.id);
        let current = if unlocked {
            threshold
        } else {
            current_value(def.requirement.kind, progress).min(threshold)
        };
        AchievementStatus {
            id: def.id.clone(),
            title: def.title.clone(),
            description: def.description.clone(),
            category: def.category,
            point_reward: def.point_reward,
            unlocked,
            current,
            threshold,
            ratio: current as f64 / threshold as f64,
        }
    }

    /// Every achievement in catalog order, optionally filtered by category.
    pub fn board(
        &self,
        progress: &UserProgress,
        category: Option<AchievementCategory>,
    ) -> Vec<AchievementStatus> {
        self.catalog
            .achievements()
            .iter()
            .filter(|def| category.map_or(true, |c| def.category == c))
            .map(|def| self.status(def, progress))
            .collect()
    }

    /// Locked achievements nearest to unlocking, best first.
    pub fn closest_locked(&self, progress: &UserProgress, count: usize) -> Vec<AchievementStatus> {
        let mut locked: Vec<_> = self
            .board(progress, None)
            .into_iter()
            .filter(|s| !s.unlocked)
            .collect();
        locked.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
        locked.truncate(count);
        locked
    }
}

fn current_value(kind: RequirementKind, progress: &UserProgress) -> u64 {
    match kind {
        RequirementKind::TotalFasts => u64::from(progress.total_fasts()),
        RequirementKind::Streak => u64::from(progress.current_streak()),
        RequirementKind::PointsAccumulated => progress.points(),
    }
}
