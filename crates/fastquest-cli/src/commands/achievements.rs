use clap::Subcommand;
use fastquest_core::{AchievementCategory, AchievementEngine};

use super::progress::load_progress;
use super::{print_json, Context};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// All achievements with unlock state and progress
    List {
        /// Only show this category (beginner, dedication, consistency, specialist, master, epic)
        #[arg(long)]
        category: Option<AchievementCategory>,
    },
    /// Locked achievements closest to unlocking
    Next {
        #[arg(long, default_value = "2")]
        count: usize,
    },
}

pub fn run(user: Option<String>, action: AchievementsAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(user)?;
    let engine = AchievementEngine::new(ctx.config.catalog()?, ctx.curve);
    let progress = load_progress(&ctx);

    match action {
        AchievementsAction::List { category } => {
            print_json(&engine.board(&progress, category))?;
        }
        AchievementsAction::Next { count } => {
            print_json(&engine.closest_locked(&progress, count))?;
        }
    }
    Ok(())
}
