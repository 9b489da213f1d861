//! Messages exchanged with the UI collaborator, one JSON object per line.

use crate::error::AppError;
use crate::reminder::{Reminder, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands the UI sends to the engine.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Schedule a new reminder. `time` is a user-entered time expression.
    AddReminder { message: String, time: String },

    /// Reschedule the reminder(s) at `id` and clear their expired flag.
    RepeatReminder { id: Selector, time: String },

    /// Remove a position, `"all"` or `"expired"`.
    DeleteItem { id: Selector },

    StartWatching,
    StopWatching,

    /// The host woke from sleep or regained focus; recompute from the wall clock.
    Resume,

    SetDarkMode { on: bool },
    SetLaunchAtStart { on: bool },

    Shutdown,
}

/// Why the list was republished
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeCause {
    Loaded,
    Added,
    Repeated,
    Deleted,
    Expired,
}

/// Events the engine pushes to the UI.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiEvent {
    /// Full list, most recent first. `ADDED` and `REPEATED` confirm the
    /// user's own add or repeat.
    RemindersChanged {
        cause: ChangeCause,
        reminders: Vec<Reminder>,
    },

    AddFailed { reason: AppError },

    RepeatFailed { reason: AppError },
}

/// One decoded input line, queued to the engine in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(Command),
    /// An add or repeat whose payload could not be decoded; the failure
    /// event still has to reach the UI.
    Rejected(UiEvent),
}

impl From<Command> for Inbound {
    fn from(command: Command) -> Self {
        Inbound::Command(command)
    }
}

/// Decode one input line.
///
/// Add and repeat lines that fail to decode become the matching failure
/// event. Anything else undecodable is returned as an error for the caller
/// to log.
pub fn decode_line(line: &str) -> Result<Inbound, serde_json::Error> {
    let err = match serde_json::from_str::<Command>(line) {
        Ok(command) => return Ok(Inbound::Command(command)),
        Err(e) => e,
    };

    let kind = serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|value| value.get("type").and_then(Value::as_str).map(str::to_owned));
    let reason = || AppError::validation(format!("malformed command: {}", err));

    match kind.as_deref() {
        Some("ADD_REMINDER") => Ok(Inbound::Rejected(UiEvent::AddFailed { reason: reason() })),
        Some("REPEAT_REMINDER") => Ok(Inbound::Rejected(UiEvent::RepeatFailed { reason: reason() })),
        _ => Err(err),
    }
}
