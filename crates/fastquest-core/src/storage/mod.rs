mod config;
pub mod database;

pub use config::{AchievementsConfig, Config, FastingConfig, ProgressionConfig, UserConfig};
pub use database::{Database, FastRecord, FastStats, FinishedFast};

use std::path::PathBuf;

use crate::error::StoreError;
use crate::progression::UserProgress;
use crate::session::FastingSession;

/// Durable per-user counters. `Ok(None)` means no record exists yet.
pub trait ProgressStore {
    fn load(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError>;
    fn save(&self, user_id: &str, progress: &UserProgress) -> Result<(), StoreError>;
}

/// Persisted session so a running fast survives restarts.
pub trait SessionStore {
    fn load_session(&self, user_id: &str) -> Result<Option<FastingSession>, StoreError>;
    fn save_session(&self, user_id: &str, session: &FastingSession) -> Result<(), StoreError>;
}

/// Append-only log of finished fasts.
pub trait HistoryStore {
    fn record_fast(&self, user_id: &str, fast: &FinishedFast) -> Result<i64, StoreError>;
}

/// Writes everything a finished fast changes.
pub trait FinishStore: ProgressStore + SessionStore + HistoryStore {
    /// Persist the idle session, the new progress and the history row.
    ///
    /// The default issues three separate writes and stops at the first
    /// failure. Stores with transactions should override it.
    fn commit_finish(
        &self,
        user_id: &str,
        session: &FastingSession,
        progress: &UserProgress,
        fast: &FinishedFast,
    ) -> Result<i64, StoreError> {
        self.save(user_id, progress)?;
        self.save_session(user_id, session)?;
        self.record_fast(user_id, fast)
    }
}

impl<T: ProgressStore + ?Sized> ProgressStore for &T {
    fn load(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        (**self).load(user_id)
    }
    fn save(&self, user_id: &str, progress: &UserProgress) -> Result<(), StoreError> {
        (**self).save(user_id, progress)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn load_session(&self, user_id: &str) -> Result<Option<FastingSession>, StoreError> {
        (**self).load_session(user_id)
    }
    fn save_session(&self, user_id: &str, session: &FastingSession) -> Result<(), StoreError> {
        (**self).save_session(user_id, session)
    }
}

impl<T: HistoryStore + ?Sized> HistoryStore for &T {
    fn record_fast(&self, user_id: &str, fast: &FinishedFast) -> Result<i64, StoreError> {
        (**self).record_fast(user_id, fast)
    }
}

impl<T: FinishStore + ?Sized> FinishStore for &T {
    fn commit_finish(
        &self,
        user_id: &str,
        session: &FastingSession,
        progress: &UserProgress,
        fast: &FinishedFast,
    ) -> Result<i64, StoreError> {
        (**self).commit_finish(user_id, session, progress, fast)
    }
}

/// Returns the data directory, creating it if needed.
///
/// `FASTQUEST_HOME` overrides the location outright. Otherwise it is
/// `~/.config/fastquest`, or `~/.config/fastquest-dev` with `FASTQUEST_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("FASTQUEST_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FASTQUEST_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("fastquest-dev")
            } else {
                base_dir.join("fastquest")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
