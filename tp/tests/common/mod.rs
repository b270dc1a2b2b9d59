//! Fake task server for HTTP tests
//!
//! Serves the planning routes with canned data, remembers saved answers so a
//! later start-planning resumes them, and records every request it sees.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use taskplan::domain::{PlanAnswer, Task};
use tokio::net::TcpListener;

/// One request seen by the task server
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: String,
}

#[derive(Clone)]
struct ServerState {
    task: Task,
    answers: Arc<Mutex<Vec<PlanAnswer>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    replies: Arc<Mutex<HashMap<&'static str, (StatusCode, String)>>>,
}

pub struct TaskServer {
    pub base_url: String,
    state: ServerState,
}

impl TaskServer {
    pub async fn spawn(task: Task) -> Self {
        let state = ServerState {
            task,
            answers: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(HashMap::new())),
        };

        let app = Router::new()
            .route("/api/tasks/{id}", get(get_task))
            .route("/api/tasks/{id}/start-planning", post(start_planning))
            .route("/api/tasks/{id}/plan-answers", post(plan_answers))
            .route("/api/tasks/{id}/complete-planning", post(complete_planning))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Answer `route` with a fixed status and raw body from now on
    ///
    /// Routes are named `task`, `start-planning`, `plan-answers` and `complete-planning`.
    pub fn reply(&self, route: &'static str, status: StatusCode, body: impl Into<String>) {
        self.state.replies.lock().unwrap().insert(route, (status, body.into()));
    }

    /// Store an answer as if an earlier session had saved it
    pub fn seed_answer(&self, question_id: &str, answer: &str) {
        self.state.answers.lock().unwrap().push(PlanAnswer {
            question_id: question_id.to_string(),
            answer: answer.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl ServerState {
    fn respond(&self, route: &'static str, method: Method, uri: Uri, body: String, data: impl FnOnce() -> Value) -> Response {
        self.requests.lock().unwrap().push(Recorded {
            method,
            path: uri.path().to_string(),
            body,
        });

        let scripted = self.replies.lock().unwrap().get(route).cloned();
        match scripted {
            Some((status, raw)) => (status, [(header::CONTENT_TYPE, "application/json")], raw).into_response(),
            None => Json(json!({"success": true, "data": data()})).into_response(),
        }
    }
}

async fn get_task(State(state): State<ServerState>, method: Method, uri: Uri, body: String) -> Response {
    let task = serde_json::to_value(&state.task).unwrap();
    state.respond("task", method, uri, body, || task)
}

async fn start_planning(State(state): State<ServerState>, method: Method, uri: Uri, body: String) -> Response {
    let existing = state.answers.lock().unwrap().clone();
    state.respond("start-planning", method, uri, body, || {
        json!({
            "task_status": "planning",
            "questions": [
                {"id": "q1", "question": "What is in scope?", "category": "features",
                 "required": true, "suggestedAnswers": ["CSV", "PDF"]},
                {"id": "q2", "question": "Any deadline?", "category": "other", "required": false}
            ],
            "existing_answers": existing,
            "plan_summary": null
        })
    })
}

async fn plan_answers(State(state): State<ServerState>, method: Method, uri: Uri, body: String) -> Response {
    if let Ok(request) = serde_json::from_str::<Value>(&body)
        && let Some(answers) = request.get("answers").cloned()
        && let Ok(answers) = serde_json::from_value::<Vec<PlanAnswer>>(answers)
    {
        let mut stored = state.answers.lock().unwrap();
        for answer in answers {
            stored.retain(|a| a.question_id != answer.question_id);
            stored.push(answer);
        }
    }
    let is_complete = state.answers.lock().unwrap().iter().any(|a| a.question_id == "q1");
    state.respond("plan-answers", method, uri, body, || {
        json!({"saved_count": 1, "is_complete": is_complete, "plan_summary": "## Requirements Summary"})
    })
}

async fn complete_planning(State(state): State<ServerState>, method: Method, uri: Uri, body: String) -> Response {
    state.respond("complete-planning", method, uri, body, || {
        json!({
            "task_status": "inprogress",
            "plan_summary": "## Requirements Summary",
            "sync_info": {"synced": true, "commits_pulled": 0}
        })
    })
}
