//! HTTP planning service client
//!
//! Talks to the task server's planning routes. Every response body is wrapped
//! in an `ApiResponse` envelope: `{ "success": bool, "data": T, "message": str }`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    CompletePlanningResponse, PlanningService, SavePlanAnswersRequest, SavePlanAnswersResponse, ServiceError,
    StartPlanningResponse,
};
use crate::config::ServiceConfig;
use crate::domain::Task;

/// Response envelope used by every task server route
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

/// Planning service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpPlanningService {
    base_url: String,
    http: Client,
}

impl HttpPlanningService {
    /// Create a client for the given base URL with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        Self::from_config(&ServiceConfig {
            base_url: base_url.into(),
            ..ServiceConfig::default()
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(ServiceError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self, task_id: Uuid, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/api/tasks/{}", self.base_url, task_id)
        } else {
            format!("{}/api/tasks/{}/{}", self.base_url, task_id, suffix)
        }
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, body_len = body.len(), "send: received response");

        if !status.is_success() {
            let message = error_message(status, &body);
            warn!(%status, %message, "send: service returned error status");
            if status == StatusCode::NOT_FOUND {
                return Err(ServiceError::NotFound(message));
            }
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> =
            serde_json::from_str(&body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        if !envelope.success {
            let message = envelope.message.unwrap_or_else(|| "request rejected".to_string());
            debug!(%message, "send: envelope reported failure");
            return Err(ServiceError::Rejected(message));
        }

        envelope
            .data
            .ok_or_else(|| ServiceError::InvalidResponse("response envelope has no data".to_string()))
    }
}

/// Best-effort human readable message for an error response
fn error_message(status: StatusCode, body: &str) -> String {
    if let Some(message) = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
    {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl PlanningService for HttpPlanningService {
    async fn get_task(&self, task_id: Uuid) -> Result<Task, ServiceError> {
        debug!(%task_id, "get_task: called");
        self.send(self.http.get(self.task_url(task_id, ""))).await
    }

    async fn start_planning(&self, task_id: Uuid) -> Result<StartPlanningResponse, ServiceError> {
        debug!(%task_id, "start_planning: called");
        self.send(self.http.post(self.task_url(task_id, "start-planning"))).await
    }

    async fn save_plan_answers(
        &self,
        task_id: Uuid,
        request: SavePlanAnswersRequest,
    ) -> Result<SavePlanAnswersResponse, ServiceError> {
        debug!(%task_id, answer_count = request.answers.len(), "save_plan_answers: called");
        self.send(self.http.post(self.task_url(task_id, "plan-answers")).json(&request))
            .await
    }

    async fn complete_planning(&self, task_id: Uuid) -> Result<CompletePlanningResponse, ServiceError> {
        debug!(%task_id, "complete_planning: called");
        self.send(self.http.post(self.task_url(task_id, "complete-planning"))).await
    }
}
