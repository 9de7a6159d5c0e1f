use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::achievements::AchievementId;

/// Every user-visible state change produces an Event.
/// The presentation layer turns these into toasts; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        target_hours: u32,
        at: DateTime<Utc>,
    },
    SessionResumed {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    SessionPaused {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    /// Elapsed time crossed the target while running.
    TargetReached {
        target_hours: u32,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        elapsed_seconds: u64,
        reward: u64,
        at: DateTime<Utc>,
    },
    SessionAborted {
        elapsed_seconds: u64,
        target_seconds: u64,
        at: DateTime<Utc>,
    },
    TargetChanged {
        target_hours: u32,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        id: AchievementId,
        title: String,
        reward: u64,
        at: DateTime<Utc>,
    },
    LevelUp {
        from: u32,
        to: u32,
        at: DateTime<Utc>,
    },
    /// A command was refused; state is unchanged.
    ActionRejected {
        reason: String,
        at: DateTime<Utc>,
    },
    /// Persistence failed; in-memory state stays authoritative.
    StoreWarning {
        message: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Human-readable one-liner for toast-style display.
    pub fn notice(&self) -> String {
        match self {
            Event::SessionStarted { target_hours, .. } => {
                format!("Fast started! Target: {target_hours}h")
            }
            Event::SessionResumed { elapsed_seconds, .. } => {
                format!("Fast resumed at {}", crate::session::format_hms(*elapsed_seconds))
            }
            Event::SessionPaused { elapsed_seconds, .. } => {
                format!("Fast paused at {}", crate::session::format_hms(*elapsed_seconds))
            }
            Event::TargetReached { target_hours, .. } => {
                format!("{target_hours}h target reached, finish whenever you're ready")
            }
            Event::SessionCompleted { reward, .. } => {
                format!("Fast completed! +{reward} FastPoints")
            }
            Event::SessionAborted { .. } => {
                "Fast ended early. Don't give up, try again when you're ready.".to_string()
            }
            Event::TargetChanged { target_hours, .. } => format!("Target set to {target_hours}h"),
            Event::AchievementUnlocked { title, reward, .. } => {
                format!("Achievement unlocked: {title} (+{reward} FastPoints)")
            }
            Event::LevelUp { to, .. } => format!("Level up! You are now level {to}"),
            Event::ActionRejected { reason, .. } => reason.clone(),
            Event::StoreWarning { message, .. } => format!("Progress not saved: {message}"),
        }
    }
}

/// Receives event notices for presentation.
pub trait NotificationSink {
    fn notify(&self, event: &Event);
}

/// Writes every notice to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &Event) {
        match event {
            Event::ActionRejected { .. } | Event::StoreWarning { .. } => {
                tracing::warn!(notice = %event.notice(), "notification");
            }
            _ => tracing::info!(notice = %event.notice(), "notification"),
        }
    }
}

/// Collects events in order; used by tests and by the CLI for JSON output.
impl NotificationSink for RefCell<Vec<Event>> {
    fn notify(&self, event: &Event) {
        self.borrow_mut().push(event.clone());
    }
}

/// Delivers each event to both sinks, left first.
impl<A: NotificationSink, B: NotificationSink> NotificationSink for (A, B) {
    fn notify(&self, event: &Event) {
        self.0.notify(event);
        self.1.notify(event);
    }
}

impl<N: NotificationSink + ?Sized> NotificationSink for &N {
    fn notify(&self, event: &Event) {
        (**self).notify(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::SessionCompleted {
            elapsed_seconds: 57_600,
            reward: 160,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SessionCompleted");
        assert_eq!(json["reward"], 160);
    }

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = RefCell::new(Vec::new());
        let at = Utc::now();
        sink.notify(&Event::SessionStarted { target_hours: 16, at });
        sink.notify(&Event::SessionPaused { elapsed_seconds: 10, at });
        let events = sink.into_inner();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::SessionStarted { .. }));
        assert!(matches!(events[1], Event::SessionPaused { .. }));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn tracing_sink_logs_notices_by_severity() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            TracingSink.notify(&Event::SessionStarted {
                target_hours: 16,
                at: Utc::now(),
            });
            TracingSink.notify(&Event::ActionRejected {
                reason: "Cannot pause while idle".into(),
                at: Utc::now(),
            });
        });

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO") && lines[0].contains("Fast started! Target: 16h"));
        assert!(lines[1].contains("WARN") && lines[1].contains("Cannot pause while idle"));
    }

    #[test]
    fn paired_sinks_both_receive() {
        let first = RefCell::new(Vec::new());
        let second = RefCell::new(Vec::new());
        let sink = (&first, &second);
        sink.notify(&Event::SessionStarted {
            target_hours: 16,
            at: Utc::now(),
        });
        assert_eq!(first.borrow().len(), 1);
        assert_eq!(*first.borrow(), *second.borrow());
    }

    #[test]
    fn notice_mentions_reward() {
        let event = Event::AchievementUnlocked {
            id: AchievementId::new("first_fast"),
            title: "First Fast".into(),
            reward: 50,
            at: Utc::now(),
        };
        assert!(event.notice().contains("+50"));
    }
}
