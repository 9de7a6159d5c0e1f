mod engine;
mod phase;

pub use engine::{
    completion_reward, format_hms, FastingSession, SessionOutcome, SessionSnapshot, SessionState,
    DEFAULT_TARGET_HOURS,
};
pub use phase::MetabolicPhase;
