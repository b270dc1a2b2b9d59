//! Session events
//!
//! Every observable change of a session is broadcast so that front ends can
//! render per-field save status and banners without polling.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use super::state::ErrorKind;
use crate::domain::SaveState;

/// Observable session activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// A start/resume request was issued
    LoadStarted,
    /// Questions and prior answers replaced the session state
    Loaded {
        question_count: usize,
        answer_count: usize,
        is_complete: bool,
    },
    /// The user changed an answer
    AnswerChanged { question_id: String },
    /// A field moved to a new save state
    SaveStateChanged { question_id: String, state: SaveState },
    /// The planning service reported new completeness or a new summary
    PlanUpdated { is_complete: bool, has_summary: bool },
    /// A banner-level error was raised
    ErrorRaised { kind: ErrorKind, message: String },
    /// Completion was requested from the planning service
    CompletionStarted,
    /// Planning completed; the session resolves with this summary
    Resolved { plan_summary: String },
    /// The session was torn down
    Closed { cancelled_timers: usize },
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LoadStarted => "load_started",
            Self::Loaded { .. } => "loaded",
            Self::AnswerChanged { .. } => "answer_changed",
            Self::SaveStateChanged { .. } => "save_state_changed",
            Self::PlanUpdated { .. } => "plan_updated",
            Self::ErrorRaised { .. } => "error_raised",
            Self::CompletionStarted => "completion_started",
            Self::Resolved { .. } => "resolved",
            Self::Closed { .. } => "closed",
        }
    }
}

/// Broadcast channel for session events
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "SessionEvents::new: called");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub fn emit(&self, event: SessionEvent) {
        debug!(event_type = event.event_type(), "SessionEvents::emit");
        let _ = self.tx.send(event);
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}
