//! Session messages
//!
//! Commands and responses for the controller actor, plus the internal
//! reports that timers and network calls send back to it.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use super::state::SessionSnapshot;
use crate::domain::TaskStatus;
use crate::service::{
    CompletePlanningResponse, SavePlanAnswersResponse, ServiceError, StartPlanningResponse,
};

/// Errors from session operations
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Failed to load planning session: {0}")]
    Load(Arc<ServiceError>),

    #[error("Failed to save answer: {0}")]
    Save(String),

    #[error("Failed to complete planning: {0}")]
    Completion(Arc<ServiceError>),

    #[error("Task must be in 'todo' or 'planning' status before planning (status: {0})")]
    NotPlannable(TaskStatus),

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Cannot start development: {0}")]
    NotReady(String),

    #[error("Completion already in progress")]
    CompletionInFlight,

    #[error("Session closed")]
    Closed,
}

impl SessionError {
    /// Underlying planning service error, if any
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Load(e) | Self::Completion(e) => Some(e),
            _ => None,
        }
    }
}

/// Response from session operations
pub type SessionResponse<T> = Result<T, SessionError>;

/// Commands sent to the controller actor by a session handle
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Load {
        reply: oneshot::Sender<SessionResponse<SessionSnapshot>>,
    },
    SetAnswer {
        question_id: String,
        value: String,
        reply: oneshot::Sender<SessionResponse<()>>,
    },
    Complete {
        reply: oneshot::Sender<SessionResponse<CompletePlanningResponse>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionResponse<SessionSnapshot>>,
    },
    Flush {
        reply: oneshot::Sender<SessionResponse<()>>,
    },
    Close {
        reply: oneshot::Sender<SessionResponse<()>>,
    },
}

/// Reports from tasks spawned by the controller
///
/// Every report that can outlive a reload carries the epoch it was issued in.
#[derive(Debug)]
pub(crate) enum Internal {
    LoadFinished {
        result: Result<StartPlanningResponse, ServiceError>,
    },
    TimerFired {
        epoch: u64,
        question_id: String,
        value: String,
        generation: u64,
    },
    SaveFinished {
        epoch: u64,
        question_id: String,
        generation: u64,
        result: Result<SavePlanAnswersResponse, ServiceError>,
    },
    CompleteFinished {
        epoch: u64,
        result: Result<CompletePlanningResponse, ServiceError>,
    },
}
