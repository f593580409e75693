use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{domain::Gesture, error::FailureReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// Majority vote over the recent gesture history.
    Gesture,
    /// Injected through the override channel (keyboard, test harness).
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: Uuid,
    },
    CommandChanged {
        session_id: Uuid,
        from: Gesture,
        to: Gesture,
        source: CommandSource,
    },
    Failed(FailureReport),
    Stopped {
        session_id: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLogEntry {
    pub at: DateTime<Utc>,
    pub from: Gesture,
    pub to: Gesture,
    pub source: CommandSource,
}
