//! Static achievement catalog.
//!
//! The built-in table ships with the binary; an alternative table can be
//! loaded from TOML. Either way it is validated once, up front.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchievementId(String);

impl AchievementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AchievementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Beginner,
    Dedication,
    Consistency,
    Specialist,
    Master,
    Epic,
}

impl std::str::FromStr for AchievementCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "dedication" => Ok(Self::Dedication),
            "consistency" => Ok(Self::Consistency),
            "specialist" => Ok(Self::Specialist),
            "master" => Ok(Self::Master),
            "epic" => Ok(Self::Epic),
            other => Err(format!("unknown achievement category: {other}")),
        }
    }
}

/// Which cumulative counter a requirement reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    TotalFasts,
    Streak,
    PointsAccumulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: AchievementCategory,
    pub point_reward: u64,
    pub requirement: Requirement,
}

/// Versioned, validated list of achievements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    achievements: Vec<AchievementDefinition>,
}

impl Catalog {
    /// # Errors
    /// Returns a `CatalogError` describing the first invalid entry.
    pub fn new(version: u32, achievements: Vec<AchievementDefinition>) -> Result<Self, CatalogError> {
        let catalog = Self {
            version,
            achievements,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn builtin() -> Self {
        use AchievementCategory::*;
        use RequirementKind::*;

        let def = |id: &str, title: &str, description: &str, category, point_reward, kind, threshold| {
            AchievementDefinition {
                id: AchievementId::new(id),
                title: title.to_string(),
                description: description.to_string(),
                category,
                point_reward,
                requirement: Requirement { kind, threshold },
            }
        };

        Self {
            version: 1,
            achievements: vec![
                def("first_fast", "First Fast", "Complete your first fast", Beginner, 50, TotalFasts, 1),
                def("iron_streak", "Iron Streak", "Complete 7 fasts in a row", Consistency, 200, Streak, 7),
                def(
                    "sixteen_eight_master",
                    "16:8 Master",
                    "Complete 10 fasts",
                    Specialist,
                    300,
                    TotalFasts,
                    10,
                ),
                def(
                    "dedicated_faster",
                    "Dedicated Faster",
                    "Complete 30 fasts in a row",
                    Dedication,
                    400,
                    Streak,
                    30,
                ),
                def("zen_master", "Zen Master", "Complete 50 fasts in total", Master, 500, TotalFasts, 50),
                def("centurion", "Centurion", "Complete 100 fasts in total", Master, 1000, TotalFasts, 100),
                def(
                    "epic_journey",
                    "Epic Journey",
                    "Accumulate 1000 FastPoints",
                    Epic,
                    750,
                    PointsAccumulated,
                    1000,
                ),
            ],
        }
    }

    /// Load a catalog from a TOML file.
    ///
    /// # Errors
    /// Returns `ParseFailed` on unreadable or malformed input, or the
    /// validation error for the first bad entry.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::ParseFailed(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog =
            toml::from_str(content).map_err(|e| CatalogError::ParseFailed(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn achievements(&self) -> &[AchievementDefinition] {
        &self.achievements
    }

    pub fn get(&self, id: &AchievementId) -> Option<&AchievementDefinition> {
        self.achievements.iter().find(|a| &a.id == id)
    }

    pub fn len(&self) -> usize {
        self.achievements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty()
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.achievements.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for achievement in &self.achievements {
            let id = achievement.id.as_str();
            if id.trim().is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if !seen.insert(id) {
                return Err(CatalogError::DuplicateId(id.to_string()));
            }
            if achievement.point_reward == 0 {
                return Err(CatalogError::ZeroReward(id.to_string()));
            }
            if achievement.requirement.threshold == 0 {
                return Err(CatalogError::ZeroThreshold(id.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
