//! Share text and the local leaderboard.
//!
//! Only composition lives here. Delivering a share card is the job of
//! whatever platform integration sits on top.

use serde::{Deserialize, Serialize};

use crate::progression::UserProgress;

/// Milestone summary a user can share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareCard {
    pub fasted_hours: u64,
    pub streak: u32,
    pub level: u32,
    pub achievement: Option<String>,
}

impl ShareCard {
    pub fn new(fasted_hours: u64, progress: &UserProgress, achievement: Option<String>) -> Self {
        Self {
            fasted_hours,
            streak: progress.current_streak(),
            level: progress.level(),
            achievement,
        }
    }

    pub fn message(&self) -> String {
        let mut msg = format!(
            "I just completed a {}h fast on FastQuest! 🎉\n\n✨ {} fasts in a row\n🚀 Level {}",
            self.fasted_hours, self.streak, self.level
        );
        if let Some(ref achievement) = self.achievement {
            msg.push_str(&format!("\n🏆 {achievement}"));
        }
        msg.push_str("\n\nJoin me on this health journey!");
        msg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub user_id: String,
    pub points: u64,
    pub level: u32,
    pub total_fasts: u32,
    pub current_streak: u32,
    pub medal: Option<Medal>,
}

pub struct Leaderboard;

impl Leaderboard {
    /// Points descending, then total fasts descending, then user id.
    pub fn rank<I>(users: I, limit: usize) -> Vec<LeaderboardEntry>
    where
        I: IntoIterator<Item = (String, UserProgress)>,
    {
        let mut users: Vec<_> = users.into_iter().collect();
        users.sort_by(|(a_id, a), (b_id, b)| {
            b.points()
                .cmp(&a.points())
                .then_with(|| b.total_fasts().cmp(&a.total_fasts()))
                .then_with(|| a_id.cmp(b_id))
        });

        users
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (user_id, progress))| {
                let position = i + 1;
                LeaderboardEntry {
                    position,
                    user_id,
                    points: progress.points(),
                    level: progress.level(),
                    total_fasts: progress.total_fasts(),
                    current_streak: progress.current_streak(),
                    medal: medal_for(position),
                }
            })
            .collect()
    }
}

fn medal_for(position: usize) -> Option<Medal> {
    match position {
        1 => Some(Medal::Gold),
        2 => Some(Medal::Silver),
        3 => Some(Medal::Bronze),
        _ => None,
    }
}
