//! Planning service client
//!
//! The planning service owns all durable planning state: the generated
//! question set, saved answers, the plan summary and the task status. The
//! session controller consumes it through the [`PlanningService`] trait.
//!
//! Two implementations ship with the crate:
//! - [`HttpPlanningService`] - talks to the task server over HTTP
//! - [`InMemoryPlanningService`] - process-local, used for offline runs and tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod error;
mod http;
mod memory;
#[cfg(test)]
pub mod mock;

pub use error::ServiceError;
pub use http::HttpPlanningService;
pub use memory::{InMemoryPlanningService, default_questions, render_summary};

use crate::domain::{ClarificationQuestion, PlanAnswer, Task, TaskStatus};

/// Response to `start_planning`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPlanningResponse {
    #[serde(default)]
    pub task_status: Option<TaskStatus>,
    pub questions: Vec<ClarificationQuestion>,
    #[serde(default)]
    pub existing_answers: Vec<PlanAnswer>,
    #[serde(default)]
    pub plan_summary: Option<String>,
}

/// Request body for `save_plan_answers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePlanAnswersRequest {
    pub answers: Vec<PlanAnswer>,
}

impl SavePlanAnswersRequest {
    /// Request carrying exactly one answer
    pub fn single(question_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            answers: vec![PlanAnswer::new(question_id, answer)],
        }
    }
}

/// Response to `save_plan_answers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePlanAnswersResponse {
    #[serde(default)]
    pub saved_count: usize,
    pub is_complete: bool,
    #[serde(default)]
    pub plan_summary: Option<String>,
}

/// Repository sync details reported after completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningSyncInfo {
    pub synced: bool,
    pub commits_pulled: i32,
}

/// Response to `complete_planning`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePlanningResponse {
    #[serde(default)]
    pub task_status: Option<TaskStatus>,
    pub plan_summary: String,
    #[serde(default)]
    pub sync_info: Option<PlanningSyncInfo>,
}

/// Remote collaborator that generates questions, stores answers and produces plans
#[async_trait]
pub trait PlanningService: Send + Sync {
    /// Fetch the current task snapshot
    async fn get_task(&self, task_id: Uuid) -> Result<Task, ServiceError>;

    /// Start planning for a `todo` task, or resume it for a `planning` task
    async fn start_planning(&self, task_id: Uuid) -> Result<StartPlanningResponse, ServiceError>;

    /// Persist answers and report whether planning is now complete
    async fn save_plan_answers(
        &self,
        task_id: Uuid,
        request: SavePlanAnswersRequest,
    ) -> Result<SavePlanAnswersResponse, ServiceError>;

    /// Finalize planning and move the task out of the planning phase
    async fn complete_planning(&self, task_id: Uuid) -> Result<CompletePlanningResponse, ServiceError>;
}
