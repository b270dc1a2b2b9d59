//! In-process planning service
//!
//! Mirrors the task server's planning rules without a network hop: a `todo`
//! task is moved to `planning` when questions are assigned, answers are
//! upserted per question, and completing the plan moves the task to
//! `inprogress`. Question generation is replaced by a fixed question set.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    CompletePlanningResponse, PlanningService, SavePlanAnswersRequest, SavePlanAnswersResponse, ServiceError,
    StartPlanningResponse,
};
use crate::domain::{ClarificationQuestion, PlanAnswer, QuestionCategory, Task, TaskStatus};

/// Question set used when none is supplied
pub fn default_questions() -> Vec<ClarificationQuestion> {
    vec![
        ClarificationQuestion::new(
            "q1",
            "What is the core user flow this task must deliver?",
            QuestionCategory::Features,
        )
        .required()
        .with_suggestions(["Happy-path details", "Edge cases", "Other"]),
        ClarificationQuestion::new(
            "q2",
            "Which UI/UX constraints matter for the finished result?",
            QuestionCategory::Ui,
        )
        .with_suggestions(["Desktop", "Mobile", "Responsive"]),
        ClarificationQuestion::new(
            "q3",
            "If external services or APIs are involved, what data flows between them?",
            QuestionCategory::Integration,
        )
        .with_suggestions(["Internal API", "Third-party", "Not needed"]),
    ]
}

/// Render a markdown requirements summary from a task and its answered questions
pub fn render_summary(task: &Task, qa: &[(String, String)]) -> String {
    let mut out = String::from("## Requirements Summary\n");
    out.push_str(&format!("✅ Task: {}\n\n", task.title));
    out.push_str("### Goal\n");
    match task.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => out.push_str(&format!("- {}\n", description)),
        _ => out.push_str("- (no description)\n"),
    }
    out.push_str("\n### Clarifications\n");
    if qa.is_empty() {
        out.push_str("(no questions answered)\n");
    }
    for (question, answer) in qa {
        out.push_str(&format!("\n**Q:** {}\n**A:** {}\n", question, answer));
    }
    out
}

#[derive(Debug, Clone)]
struct TaskEntry {
    task: Task,
    questions: Vec<ClarificationQuestion>,
    answers: Vec<PlanAnswer>,
}

impl TaskEntry {
    fn is_plan_complete(&self) -> bool {
        if self.questions.is_empty() || self.answers.is_empty() {
            return false;
        }

        let answered: HashSet<&str> = self.answers.iter().map(|a| a.question_id.as_str()).collect();
        let mut required = self.questions.iter().filter(|q| q.required).peekable();

        if required.peek().is_some() {
            required.all(|q| answered.contains(q.id.as_str()))
        } else {
            !answered.is_empty()
        }
    }

    fn generate_summary(&mut self) -> String {
        let qa: Vec<(String, String)> = self
            .answers
            .iter()
            .map(|a| {
                let text = self
                    .questions
                    .iter()
                    .find(|q| q.id == a.question_id)
                    .map(|q| q.question.clone())
                    .unwrap_or_else(|| a.question_id.clone());
                (text, a.answer.clone())
            })
            .collect();
        let summary = render_summary(&self.task, &qa);
        self.task.plan_summary = Some(summary.clone());
        summary
    }
}

/// Planning service that keeps every task in memory
pub struct InMemoryPlanningService {
    tasks: Mutex<HashMap<Uuid, TaskEntry>>,
    question_set: Vec<ClarificationQuestion>,
}

impl Default for InMemoryPlanningService {
    fn default() -> Self {
        Self::new(default_questions())
    }
}

impl InMemoryPlanningService {
    /// Create a service that assigns `question_set` to every task it starts planning
    pub fn new(question_set: Vec<ClarificationQuestion>) -> Self {
        debug!(question_count = question_set.len(), "InMemoryPlanningService::new: called");
        Self {
            tasks: Mutex::new(HashMap::new()),
            question_set,
        }
    }

    /// Register a task, replacing any task with the same id
    pub fn insert_task(&self, task: Task) {
        debug!(task_id = %task.id, status = %task.status, "insert_task: called");
        let mut tasks = self.lock();
        tasks.insert(
            task.id,
            TaskEntry {
                task,
                questions: Vec::new(),
                answers: Vec::new(),
            },
        );
    }

    /// Current snapshot of a task, if known
    pub fn task(&self, task_id: Uuid) -> Option<Task> {
        self.lock().get(&task_id).map(|entry| entry.task.clone())
    }

    /// Answers currently stored for a task
    pub fn answers(&self, task_id: Uuid) -> Vec<PlanAnswer> {
        self.lock()
            .get(&task_id)
            .map(|entry| entry.answers.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn bad_request(message: &str) -> ServiceError {
    ServiceError::Api {
        status: 400,
        message: message.to_string(),
    }
}

#[async_trait]
impl PlanningService for InMemoryPlanningService {
    async fn get_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        debug!(%task_id, "get_task: called");
        self.task(task_id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {}", task_id)))
    }

    async fn start_planning(&self, task_id: Uuid) -> Result<StartPlanningResponse, ServiceError> {
        debug!(%task_id, "start_planning: called");
        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(&task_id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {}", task_id)))?;

        match entry.task.status {
            TaskStatus::Todo => {
                debug!(%task_id, "start_planning: todo task, assigning questions");
                entry.questions = self.question_set.clone();
                entry.answers.clear();
                entry.task.status = TaskStatus::Planning;
                info!(%task_id, "Planning started");
                Ok(StartPlanningResponse {
                    task_status: Some(TaskStatus::Planning),
                    questions: entry.questions.clone(),
                    existing_answers: Vec::new(),
                    plan_summary: None,
                })
            }
            TaskStatus::Planning => {
                let existing_answers = if entry.questions.is_empty() {
                    debug!(%task_id, "start_planning: no stored questions, assigning");
                    entry.questions = self.question_set.clone();
                    Vec::new()
                } else {
                    debug!(%task_id, "start_planning: resuming stored questions");
                    entry.answers.clone()
                };
                Ok(StartPlanningResponse {
                    task_status: Some(TaskStatus::Planning),
                    questions: entry.questions.clone(),
                    existing_answers,
                    plan_summary: entry.task.plan_summary.clone(),
                })
            }
            other => {
                debug!(%task_id, status = %other, "start_planning: status not plannable");
                Err(bad_request("Task must be in 'todo' or 'planning' status before planning"))
            }
        }
    }

    async fn save_plan_answers(
        &self,
        task_id: Uuid,
        request: SavePlanAnswersRequest,
    ) -> Result<SavePlanAnswersResponse, ServiceError> {
        debug!(%task_id, answer_count = request.answers.len(), "save_plan_answers: called");
        if request.answers.is_empty() {
            return Err(bad_request("At least one answer must be provided"));
        }

        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(&task_id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {}", task_id)))?;

        if let Some(unknown) = request
            .answers
            .iter()
            .find(|a| !entry.questions.iter().any(|q| q.id == a.question_id))
        {
            return Err(ServiceError::NotFound(format!("question {}", unknown.question_id)));
        }

        let saved_count = request.answers.len();
        for answer in request.answers {
            match entry.answers.iter_mut().find(|a| a.question_id == answer.question_id) {
                Some(existing) => existing.answer = answer.answer,
                None => entry.answers.push(answer),
            }
        }

        let is_complete = entry.is_plan_complete();
        let plan_summary = is_complete.then(|| entry.generate_summary());
        debug!(%task_id, is_complete, "save_plan_answers: stored");

        Ok(SavePlanAnswersResponse {
            saved_count,
            is_complete,
            plan_summary,
        })
    }

    async fn complete_planning(&self, task_id: Uuid) -> Result<CompletePlanningResponse, ServiceError> {
        debug!(%task_id, "complete_planning: called");
        let mut tasks = self.lock();
        let entry = tasks
            .get_mut(&task_id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {}", task_id)))?;

        if entry.task.status != TaskStatus::Planning {
            return Err(bad_request("Task must be in 'planning' status to complete the plan"));
        }
        if !entry.is_plan_complete() {
            return Err(bad_request(
                "Please answer all required questions before starting development",
            ));
        }

        let plan_summary = match entry.task.plan_summary.clone() {
            Some(existing) => existing,
            None => entry.generate_summary(),
        };
        entry.task.status = TaskStatus::InProgress;
        info!(%task_id, "Planning completed, task in progress");

        Ok(CompletePlanningResponse {
            task_status: Some(TaskStatus::InProgress),
            plan_summary,
            sync_info: None,
        })
    }
}
