use clap::Subcommand;
use fastquest_core::SessionState;
use serde_json::json;

use super::{print_json, Context, Events};

#[derive(Subcommand)]
pub enum FastAction {
    /// Start a new fast (or resume a paused one)
    Start {
        /// Target duration in hours (defaults to the current target)
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Pause the running fast
    Pause,
    /// Resume a paused fast
    Resume,
    /// End the fast; completes if the target was reached, aborts otherwise
    Finish,
    /// Print current session and progress as JSON
    Status,
    /// Change the default target (only while idle)
    Target {
        /// Target duration in hours
        hours: u32,
    },
    /// List the configured target presets
    Presets,
}

pub fn run(user: Option<String>, action: FastAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(user)?;

    if let FastAction::Presets = action {
        return print_json(&ctx.config.fasting.target_presets);
    }

    let events = Events::default();
    let mut tracker = ctx.tracker(&events)?;

    let finish = match action {
        FastAction::Start { hours } => {
            tracker.start(hours)?;
            None
        }
        FastAction::Pause => {
            tracker.pause()?;
            None
        }
        FastAction::Resume => {
            if tracker.session().state() != SessionState::Paused {
                return Err("no paused fast to resume".into());
            }
            tracker.start(None)?;
            None
        }
        FastAction::Finish => Some(tracker.finish()?),
        FastAction::Target { hours } => {
            tracker.set_target(hours)?;
            None
        }
        FastAction::Status | FastAction::Presets => None,
    };

    print_json(&json!({
        "events": events.borrow().as_slice(),
        "finish": finish,
        "status": tracker.snapshot(),
    }))
}
