use clap::Subcommand;
use fastquest_core::{ProgressStore, ProgressionEngine, UserProgress};
use serde_json::json;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Points, level, streak and unlocked achievements
    Show,
    /// Recently finished fasts
    History {
        /// Number of fasts to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Aggregate statistics over all finished fasts
    Stats,
}

pub fn run(user: Option<String>, action: ProgressAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(user)?;

    match action {
        ProgressAction::Show => {
            let progress = load_progress(&ctx);
            print_json(&json!({
                "user_id": ctx.user_id,
                "progress": progress,
                "level": ctx.curve.level_progress(progress.points()),
            }))?;
        }
        ProgressAction::History { limit } => {
            print_json(&ctx.db.history(&ctx.user_id, limit)?)?;
        }
        ProgressAction::Stats => {
            print_json(&ctx.db.stats(&ctx.user_id)?)?;
        }
    }
    Ok(())
}

/// Read-only view: a store failure shows fresh progress instead of failing.
pub fn load_progress(ctx: &Context) -> UserProgress {
    match ctx.db.load(&ctx.user_id) {
        Ok(Some(stored)) => ProgressionEngine::new(ctx.curve).reconcile(stored),
        Ok(None) => UserProgress::default(),
        Err(e) => {
            tracing::warn!(error = %e, "could not load progress");
            UserProgress::default()
        }
    }
}
