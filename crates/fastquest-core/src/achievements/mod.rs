mod catalog;
mod engine;

pub use catalog::{
    AchievementCategory, AchievementDefinition, AchievementId, Catalog, Requirement,
    RequirementKind,
};
pub use engine::{AchievementEngine, AchievementStatus, Evaluation};
