//! Planning session handle

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use super::SessionConfig;
use super::controller::Controller;
use super::events::{SessionEvent, SessionEvents};
use super::messages::{SessionCommand, SessionError, SessionResponse};
use super::state::SessionSnapshot;
use crate::domain::Task;
use crate::service::{CompletePlanningResponse, PlanningService};

/// Handle to a running planning session
///
/// Cloning is cheap. The session is torn down when [`PlanningSession::close`]
/// is called, when planning completes, or when the last handle is dropped.
#[derive(Clone)]
pub struct PlanningSession {
    task_id: Uuid,
    tx: mpsc::Sender<SessionCommand>,
    events: SessionEvents,
}

impl PlanningSession {
    /// Start a session for an already fetched task
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(task: Task, service: Arc<dyn PlanningService>, config: SessionConfig) -> Self {
        debug!(task_id = %task.id, status = %task.status, "open: called");
        let task_id = task.id;
        let (tx, rx) = mpsc::channel(64);
        let events = SessionEvents::new(config.event_capacity);

        Controller::spawn(task, service, &config, events.clone(), rx);

        Self { task_id, tx, events }
    }

    /// Fetch the task from the planning service and start a session for it
    pub async fn open_task(
        task_id: Uuid,
        service: Arc<dyn PlanningService>,
        config: SessionConfig,
    ) -> SessionResponse<Self> {
        debug!(%task_id, "open_task: called");
        let task = service
            .get_task(task_id)
            .await
            .map_err(|e| SessionError::Load(Arc::new(e)))?;
        Ok(Self::open(task, service, config))
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start or resume planning and load the question set
    ///
    /// Concurrent calls share one request to the planning service.
    pub async fn load(&self) -> SessionResponse<SessionSnapshot> {
        debug!(task_id = %self.task_id, "load: called");
        self.request(|reply| SessionCommand::Load { reply }).await
    }

    /// Record an answer; it is persisted after the debounce window
    pub async fn set_answer(&self, question_id: impl Into<String>, value: impl Into<String>) -> SessionResponse<()> {
        let question_id = question_id.into();
        let value = value.into();
        debug!(task_id = %self.task_id, %question_id, "set_answer: called");
        self.request(|reply| SessionCommand::SetAnswer {
            question_id,
            value,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> SessionResponse<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Wait until no saves are pending or in flight
    ///
    /// Fails with [`SessionError::Save`] when the last save left an error banner.
    pub async fn flush(&self) -> SessionResponse<()> {
        debug!(task_id = %self.task_id, "flush: called");
        self.request(|reply| SessionCommand::Flush { reply }).await
    }

    /// Ask the planning service to complete planning
    ///
    /// On success the session resolves with the final summary and closes.
    pub async fn start_development(&self) -> SessionResponse<CompletePlanningResponse> {
        debug!(task_id = %self.task_id, "start_development: called");
        self.request(|reply| SessionCommand::Complete { reply }).await
    }

    /// Tear the session down, cancelling pending saves
    ///
    /// Closing an already closed session is a no-op.
    pub async fn close(&self) -> SessionResponse<()> {
        debug!(task_id = %self.task_id, "close: called");
        match self.request(|reply| SessionCommand::Close { reply }).await {
            Err(SessionError::Closed) => Ok(()),
            other => other,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<SessionResponse<T>>) -> SessionCommand,
    ) -> SessionResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }
}

impl std::fmt::Debug for PlanningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningSession")
            .field("task_id", &self.task_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
