use fastquest_core::{Leaderboard, ProgressionEngine, ShareCard};

use super::progress::load_progress;
use super::{print_json, Context};

pub fn leaderboard(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(None)?;
    let progression = ProgressionEngine::new(ctx.curve);
    let users = ctx
        .db
        .all_progress()?
        .into_iter()
        .map(|(id, stored)| (id, progression.reconcile(stored)));
    print_json(&Leaderboard::rank(users, limit))
}

pub fn share(user: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(user)?;
    let progress = load_progress(&ctx);

    let last = ctx
        .db
        .history(&ctx.user_id, 20)?
        .into_iter()
        .find(|fast| fast.completed)
        .ok_or("no completed fast to share yet")?;

    let catalog = ctx.config.catalog()?;
    let achievement = catalog
        .achievements()
        .iter()
        .rev()
        .find(|def| progress.has_unlocked(&def.id))
        .map(|def| def.title.clone());

    let card = ShareCard::new(last.elapsed_seconds / 3600, &progress, achievement);
    println!("{}", card.message());
    Ok(())
}
