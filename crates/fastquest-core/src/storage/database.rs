//! SQLite-backed storage.
//!
//! Provides persistent storage for:
//! - Per-user progress counters and unlocked achievements
//! - The in-flight fasting session (JSON in the kv table)
//! - A history of finished fasts and statistics over it

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, FinishStore, HistoryStore, ProgressStore, SessionStore};
use crate::achievements::AchievementId;
use crate::error::StoreError;
use crate::progression::UserProgress;
use crate::session::{FastingSession, SessionOutcome};

/// A fast as it is handed to the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedFast {
    pub outcome: SessionOutcome,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastRecord {
    pub id: i64,
    pub completed: bool,
    pub elapsed_seconds: u64,
    pub target_seconds: u64,
    pub reward: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FastStats {
    pub completed: u64,
    pub aborted: u64,
    pub longest_fast_secs: u64,
    pub total_fasting_secs: u64,
    pub points_from_fasts: u64,
}

/// SQLite database for progress, sessions and history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/fastquest.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::DataDir(e.to_string()))?;
        Self::open_at(&dir.join("fastquest.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_progress (
                user_id        TEXT PRIMARY KEY,
                points         INTEGER NOT NULL DEFAULT 0,
                level          INTEGER NOT NULL DEFAULT 1,
                current_streak INTEGER NOT NULL DEFAULT 0,
                total_fasts    INTEGER NOT NULL DEFAULT 0,
                updated_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS unlocked_achievements (
                user_id        TEXT NOT NULL,
                achievement_id TEXT NOT NULL,
                unlocked_at    TEXT NOT NULL,
                PRIMARY KEY (user_id, achievement_id)
            );

            CREATE TABLE IF NOT EXISTS fast_history (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL,
                completed       INTEGER NOT NULL,
                elapsed_seconds INTEGER NOT NULL,
                target_seconds  INTEGER NOT NULL,
                reward          INTEGER NOT NULL DEFAULT 0,
                started_at      TEXT,
                finished_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_fast_history_user ON fast_history(user_id, finished_at);",
        )?;
        Ok(())
    }

    /// Most recent fasts first.
    pub fn history(&self, user_id: &str, limit: usize) -> Result<Vec<FastRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, completed, elapsed_seconds, target_seconds, reward, started_at, finished_at
             FROM fast_history
             WHERE user_id = ?1
             ORDER BY finished_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, completed, elapsed_seconds, target_seconds, reward, started_at, finished_at) = row?;
            records.push(FastRecord {
                id,
                completed,
                elapsed_seconds,
                target_seconds,
                reward,
                started_at: started_at.as_deref().map(parse_timestamp).transpose()?,
                finished_at: parse_timestamp(&finished_at)?,
            });
        }
        Ok(records)
    }

    pub fn stats(&self, user_id: &str) -> Result<FastStats, StoreError> {
        let stats = self.conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN completed = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN completed = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(MAX(elapsed_seconds), 0),
                COALESCE(SUM(elapsed_seconds), 0),
                COALESCE(SUM(reward), 0)
             FROM fast_history
             WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(FastStats {
                    completed: row.get(0)?,
                    aborted: row.get(1)?,
                    longest_fast_secs: row.get(2)?,
                    total_fasting_secs: row.get(3)?,
                    points_from_fasts: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Every stored user, for the leaderboard.
    pub fn all_progress(&self) -> Result<Vec<(String, UserProgress)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT user_id FROM user_progress ORDER BY user_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut all = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(progress) = self.load(&id)? {
                all.push((id, progress));
            }
        }
        Ok(all)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn load_unlocked(&self, user_id: &str) -> Result<BTreeSet<AchievementId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT achievement_id FROM unlocked_achievements WHERE user_id = ?1")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .map(|id| id.map(AchievementId::new))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }
}

impl ProgressStore for Database {
    fn load(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT points, level, current_streak, total_fasts
                 FROM user_progress WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((points, level, current_streak, total_fasts)) = row else {
            return Ok(None);
        };
        let unlocked = self.load_unlocked(user_id)?;
        Ok(Some(UserProgress::from_stored(
            points,
            level,
            current_streak,
            total_fasts,
            unlocked,
        )))
    }

    fn save(&self, user_id: &str, progress: &UserProgress) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        write_progress(&tx, user_id, progress)?;
        tx.commit()?;
        Ok(())
    }
}

impl SessionStore for Database {
    /// A record that decodes but breaks session invariants is `Corrupt`.
    fn load_session(&self, user_id: &str) -> Result<Option<FastingSession>, StoreError> {
        let key = session_key(user_id);
        let Some(json) = self.kv_get(&key)? else {
            return Ok(None);
        };
        let session: FastingSession = match serde_json::from_str(&json) {
            Ok(session) => session,
            Err(e) => {
                return Err(StoreError::Corrupt {
                    key,
                    message: e.to_string(),
                })
            }
        };
        match session.validate() {
            Ok(()) => Ok(Some(session)),
            Err(message) => Err(StoreError::Corrupt { key, message }),
        }
    }

    fn save_session(&self, user_id: &str, session: &FastingSession) -> Result<(), StoreError> {
        write_session(&self.conn, user_id, session)
    }
}

impl HistoryStore for Database {
    fn record_fast(&self, user_id: &str, fast: &FinishedFast) -> Result<i64, StoreError> {
        insert_fast(&self.conn, user_id, fast)
    }
}

impl FinishStore for Database {
    /// Progress, session and history land in one transaction.
    fn commit_finish(
        &self,
        user_id: &str,
        session: &FastingSession,
        progress: &UserProgress,
        fast: &FinishedFast,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        write_progress(&tx, user_id, progress)?;
        write_session(&tx, user_id, session)?;
        let id = insert_fast(&tx, user_id, fast)?;
        tx.commit()?;
        Ok(id)
    }
}

/// Unlocked achievements are only ever inserted, never removed.
fn write_progress(conn: &Connection, user_id: &str, progress: &UserProgress) -> Result<(), StoreError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO user_progress (user_id, points, level, current_streak, total_fasts, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
            points = excluded.points,
            level = excluded.level,
            current_streak = excluded.current_streak,
            total_fasts = excluded.total_fasts,
            updated_at = excluded.updated_at",
        params![
            user_id,
            progress.points(),
            progress.level(),
            progress.current_streak(),
            progress.total_fasts(),
            now,
        ],
    )?;
    for id in progress.unlocked_achievements() {
        conn.execute(
            "INSERT OR IGNORE INTO unlocked_achievements (user_id, achievement_id, unlocked_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, id.as_str(), now],
        )?;
    }
    Ok(())
}

fn write_session(conn: &Connection, user_id: &str, session: &FastingSession) -> Result<(), StoreError> {
    let key = session_key(user_id);
    let json = serde_json::to_string(session).map_err(|e| StoreError::Corrupt {
        key: key.clone(),
        message: e.to_string(),
    })?;
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, json],
    )?;
    Ok(())
}

fn insert_fast(conn: &Connection, user_id: &str, fast: &FinishedFast) -> Result<i64, StoreError> {
    let (completed, elapsed_seconds, target_seconds, reward) = match fast.outcome {
        SessionOutcome::Completed {
            elapsed_seconds,
            target_seconds,
            reward,
        } => (true, elapsed_seconds, target_seconds, reward),
        SessionOutcome::Aborted {
            elapsed_seconds,
            target_seconds,
        } => (false, elapsed_seconds, target_seconds, 0),
    };
    conn.execute(
        "INSERT INTO fast_history
            (user_id, completed, elapsed_seconds, target_seconds, reward, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            completed,
            elapsed_seconds,
            target_seconds,
            reward,
            fast.started_at.map(|t| t.to_rfc3339()),
            fast.finished_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn session_key(user_id: &str) -> String {
    format!("session:{user_id}")
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            key: raw.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::LevelCurve;
    use chrono::Duration;

    #[test]
    fn progress_roundtrip() {
        let db = Database::open_memory().unwrap();
        assert!(db.load("ana").unwrap().is_none());

        let unlocked = BTreeSet::from([AchievementId::new("first_fast")]);
        let progress = UserProgress::from_counters(210, 1, 1, unlocked, &LevelCurve::default());
        db.save("ana", &progress).unwrap();

        let loaded = db.load("ana").unwrap().unwrap();
        assert_eq!(loaded, progress);
        assert!(db.load("bo").unwrap().is_none());
    }

    #[test]
    fn saving_fewer_achievements_does_not_remove_any() {
        let db = Database::open_memory().unwrap();
        let curve = LevelCurve::default();
        let unlocked = BTreeSet::from([AchievementId::new("first_fast")]);
        db.save("ana", &UserProgress::from_counters(50, 1, 1, unlocked, &curve))
            .unwrap();
        db.save("ana", &UserProgress::from_counters(50, 0, 1, BTreeSet::new(), &curve))
            .unwrap();
        let loaded = db.load("ana").unwrap().unwrap();
        assert!(loaded.has_unlocked(&AchievementId::new("first_fast")));
        assert_eq!(loaded.current_streak(), 0);
    }

    #[test]
    fn session_roundtrip() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_session("ana").unwrap().is_none());

        let mut session = FastingSession::default();
        session.start(16, Utc::now()).unwrap();
        db.save_session("ana", &session).unwrap();
        assert_eq!(db.load_session("ana").unwrap(), Some(session));
    }

    #[test]
    fn corrupt_session_is_reported() {
        let db = Database::open_memory().unwrap();
        db.kv_set("session:ana", "{not json").unwrap();
        assert!(matches!(db.load_session("ana"), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn session_breaking_invariants_is_corrupt() {
        let db = Database::open_memory().unwrap();
        db.kv_set(
            "session:ana",
            r#"{"state":"running","target_seconds":57600,"elapsed_seconds":0}"#,
        )
        .unwrap();
        assert!(matches!(db.load_session("ana"), Err(StoreError::Corrupt { .. })));
    }

    fn completed_fast(now: DateTime<Utc>) -> FinishedFast {
        FinishedFast {
            outcome: SessionOutcome::Completed {
                elapsed_seconds: 16 * 3600,
                target_seconds: 16 * 3600,
                reward: 160,
            },
            started_at: Some(now - Duration::hours(16)),
            finished_at: now,
        }
    }

    #[test]
    fn commit_finish_writes_everything() {
        let db = Database::open_memory().unwrap();
        let progress =
            UserProgress::from_counters(160, 1, 1, BTreeSet::new(), &LevelCurve::default());
        let session = FastingSession::default();

        db.commit_finish("ana", &session, &progress, &completed_fast(Utc::now()))
            .unwrap();

        assert_eq!(db.load("ana").unwrap(), Some(progress));
        assert_eq!(db.load_session("ana").unwrap(), Some(session));
        assert_eq!(db.history("ana", 5).unwrap().len(), 1);
    }

    #[test]
    fn commit_finish_rolls_back_on_failure() {
        let db = Database::open_memory().unwrap();
        let mut running = FastingSession::default();
        running.start(16, Utc::now()).unwrap();
        db.save_session("ana", &running).unwrap();
        db.conn.execute_batch("DROP TABLE fast_history").unwrap();

        let progress =
            UserProgress::from_counters(160, 1, 1, BTreeSet::new(), &LevelCurve::default());
        let result = db.commit_finish(
            "ana",
            &FastingSession::default(),
            &progress,
            &completed_fast(Utc::now()),
        );

        assert!(result.is_err());
        assert!(db.load("ana").unwrap().is_none());
        assert_eq!(db.load_session("ana").unwrap(), Some(running));
    }

    #[test]
    fn history_and_stats() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_fast(
            "ana",
            &FinishedFast {
                outcome: SessionOutcome::Completed {
                    elapsed_seconds: 16 * 3600,
                    target_seconds: 16 * 3600,
                    reward: 160,
                },
                started_at: Some(now - Duration::hours(16)),
                finished_at: now,
            },
        )
        .unwrap();
        db.record_fast(
            "ana",
            &FinishedFast {
                outcome: SessionOutcome::Aborted {
                    elapsed_seconds: 3600,
                    target_seconds: 16 * 3600,
                },
                started_at: None,
                finished_at: now + Duration::hours(2),
            },
        )
        .unwrap();

        let history = db.history("ana", 10).unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].completed);
        assert!(history[1].completed);

        let stats = db.stats("ana").unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.aborted, 1);
        assert_eq!(stats.longest_fast_secs, 16 * 3600);
        assert_eq!(stats.total_fasting_secs, 17 * 3600);
        assert_eq!(stats.points_from_fasts, 160);

        assert_eq!(db.stats("bo").unwrap(), FastStats::default());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }
}
