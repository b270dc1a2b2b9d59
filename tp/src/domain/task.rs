//! Task domain type
//!
//! Tasks are owned by the planning service. The session only reads a snapshot
//! to decide whether planning is offered and to seed the plan summary.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Not started yet; planning may begin
    #[default]
    Todo,
    /// Clarification questions are being answered
    Planning,
    /// Planning finished, development under way
    InProgress,
    /// Work submitted for review
    InReview,
    /// Finished
    Done,
    /// Abandoned
    Cancelled,
}

impl TaskStatus {
    /// Whether the clarification flow may be offered for this status
    pub fn can_plan(self) -> bool {
        matches!(self, Self::Todo | Self::Planning)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Todo => "todo",
            Self::Planning => "planning",
            Self::InProgress => "inprogress",
            Self::InReview => "inreview",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of a task as served by the planning service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub plan_summary: Option<String>,
}

impl Task {
    /// Create a new task in `todo` with a fresh id
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        debug!(%title, "Task::new: called");
        Self {
            id: Uuid::new_v4(),
            title,
            description: None,
            status: TaskStatus::Todo,
            plan_summary: None,
        }
    }

    /// Builder: set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: set the status
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set a previously generated plan summary
    pub fn with_plan_summary(mut self, summary: impl Into<String>) -> Self {
        self.plan_summary = Some(summary.into());
        self
    }

    /// Whether the planning flow may be offered for this task
    pub fn can_plan(&self) -> bool {
        self.status.can_plan()
    }
}
