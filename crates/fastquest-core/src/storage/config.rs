//! TOML-based application configuration.
//!
//! Stores:
//! - The local user id
//! - Fasting defaults (target, presets, reward per completed hour)
//! - The level curve tuning
//! - An optional achievement catalog override
//!
//! Configuration is stored at `~/.config/fastquest/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::achievements::Catalog;
use crate::error::{CatalogError, ConfigError};
use crate::progression::{LevelCurve, DEFAULT_BASE_THRESHOLD, DEFAULT_GROWTH_FACTOR};
use crate::session::DEFAULT_TARGET_HOURS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastingConfig {
    #[serde(default = "default_target_hours")]
    pub default_target_hours: u32,
    /// FastPoints per whole hour of a completed fast.
    #[serde(default = "default_points_per_hour")]
    pub points_per_hour: u64,
    #[serde(default = "default_target_presets")]
    pub target_presets: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_base_threshold")]
    pub base_threshold: u64,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AchievementsConfig {
    /// TOML catalog to use instead of the built-in one.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/fastquest/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub fasting: FastingConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub achievements: AchievementsConfig,
}

// Default functions
fn default_user_id() -> String {
    "local".into()
}
fn default_target_hours() -> u32 {
    DEFAULT_TARGET_HOURS
}
fn default_points_per_hour() -> u64 {
    10
}
fn default_target_presets() -> Vec<u32> {
    vec![12, 14, 16, 18, 20, 24]
}
fn default_base_threshold() -> u64 {
    DEFAULT_BASE_THRESHOLD
}
fn default_growth_factor() -> f64 {
    DEFAULT_GROWTH_FACTOR
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
        }
    }
}

impl Default for FastingConfig {
    fn default() -> Self {
        Self {
            default_target_hours: default_target_hours(),
            points_per_hour: default_points_per_hour(),
            target_presets: default_target_presets(),
        }
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_threshold: default_base_threshold(),
            growth_factor: default_growth_factor(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location: `<data_dir>/config.toml`.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default configuration");
                Self::default()
            }
        }
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. Does not persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the result fails validation. `self` is unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.user.id.trim().is_empty() {
            return Err(invalid("user.id", "must not be empty"));
        }
        if self.fasting.default_target_hours == 0 {
            return Err(invalid("fasting.default_target_hours", "must be at least 1"));
        }
        if self.fasting.points_per_hour == 0 {
            return Err(invalid("fasting.points_per_hour", "must be at least 1"));
        }
        if self.fasting.target_presets.contains(&0) {
            return Err(invalid("fasting.target_presets", "presets must be at least 1 hour"));
        }
        self.level_curve()?;
        Ok(())
    }

    /// # Errors
    /// Fails if the `[progression]` values do not form a valid curve.
    pub fn level_curve(&self) -> Result<LevelCurve, ConfigError> {
        LevelCurve::new(self.progression.base_threshold, self.progression.growth_factor)
    }

    /// The configured catalog, or the built-in one.
    pub fn catalog(&self) -> Result<Catalog, CatalogError> {
        match &self.achievements.catalog_path {
            Some(path) => Catalog::load(path),
            None => Ok(Catalog::builtin()),
        }
    }
}
