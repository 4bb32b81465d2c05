//! Observability events emitted by the VM.
//!
//! The channel is bounded and the VM blocks on a full channel, so a slow
//! consumer applies natural backpressure. Dropping the receiver counts as
//! cancellation: further sends are discarded.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Debug,
    Error,
    Warning,
    Display,
    Live,
    LiveMiss,
    Dead,
    GameOver,
    Clear,
    Pause,
    /// Carries a serialized arena snapshot.
    Dump,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Debug => "Debug",
            EventKind::Error => "Error",
            EventKind::Warning => "Warning",
            EventKind::Display => "Display",
            EventKind::Live => "Live",
            EventKind::LiveMiss => "Live Miss",
            EventKind::Dead => "Dead",
            EventKind::GameOver => "Game Over",
            EventKind::Clear => "Clear",
            EventKind::Pause => "Pause",
            EventKind::Dump => "Dump",
        };
        write!(f, "{name}")
    }
}

/// Where an event originated, when it has an originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventSource {
    /// Process id, absent for player-level events such as `Dead`.
    pub pid: Option<u32>,
    pub player: u32,
}

/// One message from the VM to its observers.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub source: Option<EventSource>,
    pub message: String,
}

impl Event {
    pub fn new(kind: EventKind, source: Option<EventSource>, message: impl Into<String>) -> Self {
        Event {
            kind,
            source,
            message: message.into(),
        }
    }
}
