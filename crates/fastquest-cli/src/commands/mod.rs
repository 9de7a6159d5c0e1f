pub mod achievements;
pub mod config;
pub mod fast;
pub mod progress;
pub mod social;

use std::cell::RefCell;

use fastquest_core::{
    Config, CoreError, Database, Event, FastTracker, LevelCurve, SystemClock, TracingSink,
    TrackerSettings,
};

pub type Events = RefCell<Vec<Event>>;

/// Notices go to the log; the collected events go to stdout.
pub type Sink<'a> = (TracingSink, &'a Events);

/// Everything a user-scoped command needs.
pub struct Context {
    pub config: Config,
    pub curve: LevelCurve,
    pub db: Database,
    pub user_id: String,
}

impl Context {
    pub fn open(user: Option<String>) -> Result<Self, CoreError> {
        let config = Config::load()?;
        let curve = config.level_curve()?;
        let db = Database::open()?;
        let user_id = user.unwrap_or_else(|| config.user.id.clone());
        Ok(Self {
            config,
            curve,
            db,
            user_id,
        })
    }

    pub fn tracker<'a>(
        &'a self,
        events: &'a Events,
    ) -> Result<FastTracker<&'a Database, SystemClock, Sink<'a>>, CoreError> {
        let settings = TrackerSettings::from_config(&self.config)?;
        Ok(FastTracker::activate(
            self.user_id.clone(),
            &self.db,
            SystemClock,
            (TracingSink, events),
            settings,
        ))
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
