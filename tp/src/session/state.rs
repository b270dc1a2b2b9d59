//! Session state and snapshots
//!
//! [`SessionState`] is owned by the controller actor and never shared. Callers
//! observe it through [`SessionSnapshot`] copies.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::gate::all_required_answered;
use super::messages::SessionError;
use crate::domain::{ClarificationQuestion, SaveState, Task};
use crate::service::{CompletePlanningResponse, SavePlanAnswersResponse, ServiceError, StartPlanningResponse};

/// Which operation produced the banner error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Load,
    Save,
    Completion,
}

/// Session-wide error message shown above the questions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBanner {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorBanner {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Point-in-time copy of a planning session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub task_id: Uuid,
    pub task_title: String,
    pub questions: Vec<ClarificationQuestion>,
    pub answers: HashMap<String, String>,
    pub save_states: HashMap<String, SaveState>,
    pub plan_summary: Option<String>,
    pub is_complete: bool,
    pub is_loading: bool,
    pub is_submitting: bool,
    pub error: Option<ErrorBanner>,
    pub all_required_answered: bool,
    pub can_start_development: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    /// Save state of a field; untouched fields are idle
    pub fn save_state(&self, question_id: &str) -> SaveState {
        self.save_states.get(question_id).copied().unwrap_or_default()
    }

    pub fn question(&self, question_id: &str) -> Option<&ClarificationQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Number of required questions with a non-blank answer
    pub fn required_progress(&self) -> (usize, usize) {
        let required: Vec<_> = self.questions.iter().filter(|q| q.required).collect();
        let answered = required
            .iter()
            .filter(|q| self.answer(&q.id).is_some_and(|a| !a.trim().is_empty()))
            .count();
        (answered, required.len())
    }
}

/// Mutable state of one planning session
#[derive(Debug)]
pub(crate) struct SessionState {
    task: Task,
    questions: Vec<ClarificationQuestion>,
    answers: HashMap<String, String>,
    save_states: HashMap<String, SaveState>,
    plan_summary: Option<String>,
    is_complete: bool,
    is_loading: bool,
    is_submitting: bool,
    error: Option<ErrorBanner>,
    loaded_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(task: Task) -> Self {
        let plan_summary = task.plan_summary.clone();
        Self {
            is_complete: plan_summary.is_some(),
            plan_summary,
            task,
            questions: Vec::new(),
            answers: HashMap::new(),
            save_states: HashMap::new(),
            is_loading: false,
            is_submitting: false,
            error: None,
            loaded_at: None,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn error(&self) -> Option<&ErrorBanner> {
        self.error.as_ref()
    }

    pub fn begin_load(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    /// Reject a start/resume response the session cannot represent
    pub fn validate_load(resp: &StartPlanningResponse) -> Result<(), ServiceError> {
        let mut seen = HashSet::new();
        for question in &resp.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(ServiceError::InvalidResponse(format!(
                    "duplicate question id '{}'",
                    question.id
                )));
            }
        }
        Ok(())
    }

    /// Replace questions and answers with a successful load
    ///
    /// Existing answers are already persisted, so their fields start saved.
    /// Every other field starts idle.
    pub fn apply_load(&mut self, resp: StartPlanningResponse) {
        debug!(
            questions = resp.questions.len(),
            existing = resp.existing_answers.len(),
            "apply_load: called"
        );
        self.answers = resp
            .existing_answers
            .into_iter()
            .map(|a| (a.question_id, a.answer))
            .collect();
        self.save_states = self.answers.keys().map(|id| (id.clone(), SaveState::Saved)).collect();
        self.questions = resp.questions;

        if let Some(status) = resp.task_status {
            self.task.status = status;
        }
        self.plan_summary = resp.plan_summary.or_else(|| self.task.plan_summary.clone());
        self.is_complete = self.plan_summary.is_some();
        self.is_loading = false;
        self.error = None;
        self.loaded_at = Some(Utc::now());
    }

    /// Record a failed load, leaving prior questions and answers in place
    pub fn fail_load(&mut self, message: impl Into<String>) {
        self.is_loading = false;
        self.error = Some(ErrorBanner::new(ErrorKind::Load, message));
    }

    /// Store an edit and mark its field as saving
    pub fn set_answer(&mut self, question_id: &str, value: String) -> Result<(), SessionError> {
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(SessionError::UnknownQuestion(question_id.to_string()));
        }
        self.answers.insert(question_id.to_string(), value);
        self.save_states.insert(question_id.to_string(), SaveState::Saving);
        Ok(())
    }

    /// Apply a save response; `settles` marks the field saved
    ///
    /// Returns true when completeness or the summary changed.
    pub fn apply_save_success(&mut self, question_id: &str, resp: SavePlanAnswersResponse, settles: bool) -> bool {
        let before = (self.is_complete, self.plan_summary.clone());

        self.is_complete = resp.is_complete;
        if let Some(summary) = resp.plan_summary {
            self.plan_summary = Some(summary);
        }
        if settles {
            self.save_states.insert(question_id.to_string(), SaveState::Saved);
        }

        let save_banner = matches!(self.error, Some(ErrorBanner { kind: ErrorKind::Save, .. }));
        if save_banner && !self.save_states.values().any(|s| *s == SaveState::Error) {
            self.error = None;
        }

        before != (self.is_complete, self.plan_summary.clone())
    }

    /// Apply a failed save; only a settling failure touches the field
    pub fn apply_save_failure(&mut self, question_id: &str, message: impl Into<String>, settles: bool) -> bool {
        if !settles {
            return false;
        }
        self.save_states.insert(question_id.to_string(), SaveState::Error);
        self.error = Some(ErrorBanner::new(ErrorKind::Save, message));
        true
    }

    pub fn all_required_answered(&self) -> bool {
        all_required_answered(&self.questions, &self.answers)
    }

    /// Reason "start development" is unavailable, if any
    pub fn start_blocker(&self) -> Option<&'static str> {
        if self.is_loading {
            Some("questions are still loading")
        } else if self.questions.is_empty() {
            Some("no questions have been loaded")
        } else if !self.all_required_answered() {
            Some("please answer all required questions")
        } else {
            None
        }
    }

    pub fn can_start_development(&self) -> bool {
        !self.is_submitting && self.start_blocker().is_none()
    }

    pub fn begin_complete(&mut self) {
        self.is_submitting = true;
        self.error = None;
    }

    pub fn apply_complete_success(&mut self, resp: &CompletePlanningResponse) {
        self.plan_summary = Some(resp.plan_summary.clone());
        self.is_complete = true;
        self.is_submitting = false;
        if let Some(status) = resp.task_status {
            self.task.status = status;
        }
    }

    pub fn fail_complete(&mut self, message: impl Into<String>) {
        self.is_submitting = false;
        self.error = Some(ErrorBanner::new(ErrorKind::Completion, message));
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            task_id: self.task.id,
            task_title: self.task.title.clone(),
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            save_states: self.save_states.clone(),
            plan_summary: self.plan_summary.clone(),
            is_complete: self.is_complete,
            is_loading: self.is_loading,
            is_submitting: self.is_submitting,
            error: self.error.clone(),
            all_required_answered: self.all_required_answered(),
            can_start_development: self.can_start_development(),
            loaded_at: self.loaded_at,
        }
    }
}
