//! Scripted planning service for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::*;
use crate::domain::{PlanAnswer, Task, TaskStatus};

/// Mock planning service
///
/// Each call pops the next scripted reply; unscripted calls succeed with
/// defaults. Delays use tokio time so paused-clock tests stay deterministic.
pub struct MockPlanningService {
    task: Mutex<Task>,
    start_script: Mutex<VecDeque<(Duration, Result<StartPlanningResponse, ServiceError>)>>,
    save_script: Mutex<VecDeque<(Duration, Result<SavePlanAnswersResponse, ServiceError>)>>,
    complete_script: Mutex<VecDeque<(Duration, Result<CompletePlanningResponse, ServiceError>)>>,
    saved: Mutex<Vec<PlanAnswer>>,
    start_calls: AtomicUsize,
    complete_calls: AtomicUsize,
}

impl MockPlanningService {
    pub fn new(task: Task) -> Self {
        debug!(task_id = %task.id, "MockPlanningService::new: called");
        Self {
            task: Mutex::new(task),
            start_script: Mutex::new(VecDeque::new()),
            save_script: Mutex::new(VecDeque::new()),
            complete_script: Mutex::new(VecDeque::new()),
            saved: Mutex::new(Vec::new()),
            start_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
        }
    }

    pub fn task(&self) -> Task {
        self.task.lock().unwrap().clone()
    }

    pub fn script_start(&self, delay: Duration, result: Result<StartPlanningResponse, ServiceError>) {
        self.start_script.lock().unwrap().push_back((delay, result));
    }

    pub fn script_save(&self, delay: Duration, result: Result<SavePlanAnswersResponse, ServiceError>) {
        self.save_script.lock().unwrap().push_back((delay, result));
    }

    pub fn script_complete(&self, delay: Duration, result: Result<CompletePlanningResponse, ServiceError>) {
        self.complete_script.lock().unwrap().push_back((delay, result));
    }

    /// Every answer received, in call order
    pub fn saved(&self) -> Vec<PlanAnswer> {
        self.saved.lock().unwrap().clone()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Start response with the default question set and no prior answers
pub fn start_response() -> StartPlanningResponse {
    StartPlanningResponse {
        task_status: Some(TaskStatus::Planning),
        questions: default_questions(),
        existing_answers: vec![],
        plan_summary: None,
    }
}

pub fn save_response(is_complete: bool, plan_summary: Option<&str>) -> SavePlanAnswersResponse {
    SavePlanAnswersResponse {
        saved_count: 1,
        is_complete,
        plan_summary: plan_summary.map(String::from),
    }
}

#[async_trait]
impl PlanningService for MockPlanningService {
    async fn get_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        let task = self.task();
        if task.id == task_id {
            Ok(task)
        } else {
            Err(ServiceError::NotFound(format!("Task {} not found", task_id)))
        }
    }

    async fn start_planning(&self, _task_id: Uuid) -> Result<StartPlanningResponse, ServiceError> {
        let idx = self.start_calls.fetch_add(1, Ordering::SeqCst);
        debug!(%idx, "MockPlanningService::start_planning: called");
        let scripted = self.start_script.lock().unwrap().pop_front();
        let (delay, result) = scripted.unwrap_or_else(|| (Duration::ZERO, Ok(start_response())));
        Self::pause(delay).await;
        result
    }

    async fn save_plan_answers(
        &self,
        _task_id: Uuid,
        request: SavePlanAnswersRequest,
    ) -> Result<SavePlanAnswersResponse, ServiceError> {
        debug!(count = request.answers.len(), "MockPlanningService::save_plan_answers: called");
        self.saved.lock().unwrap().extend(request.answers);
        let scripted = self.save_script.lock().unwrap().pop_front();
        let (delay, result) = scripted.unwrap_or_else(|| (Duration::ZERO, Ok(save_response(false, None))));
        Self::pause(delay).await;
        result
    }

    async fn complete_planning(&self, _task_id: Uuid) -> Result<CompletePlanningResponse, ServiceError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        debug!("MockPlanningService::complete_planning: called");
        let scripted = self.complete_script.lock().unwrap().pop_front();
        let (delay, result) = scripted.unwrap_or_else(|| {
            (
                Duration::ZERO,
                Ok(CompletePlanningResponse {
                    task_status: Some(TaskStatus::InProgress),
                    plan_summary: "## Requirements Summary".to_string(),
                    sync_info: None,
                }),
            )
        });
        Self::pause(delay).await;
        result
    }
}
