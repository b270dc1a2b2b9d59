//! Session controller actor
//!
//! Owns [`SessionState`] and the [`Debouncer`]. Commands from handles and
//! reports from spawned tasks are processed one at a time, so no state is
//! shared across tasks.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::SessionConfig;
use super::events::{SessionEvent, SessionEvents};
use super::messages::{Internal, SessionCommand, SessionError, SessionResponse};
use super::persister::{Debouncer, SaveOutcome, spawn_persist};
use super::state::{ErrorKind, SessionSnapshot, SessionState};
use crate::domain::{SaveState, Task};
use crate::service::{
    CompletePlanningResponse, PlanningService, SavePlanAnswersResponse, ServiceError, StartPlanningResponse,
};

/// Whether the actor keeps running after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub(crate) struct Controller {
    service: Arc<dyn PlanningService>,
    state: SessionState,
    debouncer: Debouncer,
    events: SessionEvents,
    epoch: u64,
    internal_tx: mpsc::UnboundedSender<Internal>,
    load_waiters: Vec<oneshot::Sender<SessionResponse<SessionSnapshot>>>,
    flush_waiters: Vec<oneshot::Sender<SessionResponse<()>>>,
    complete_waiter: Option<oneshot::Sender<SessionResponse<CompletePlanningResponse>>>,
}

impl Controller {
    /// Spawn the actor; it runs until closed, resolved, or every handle is dropped
    pub fn spawn(
        task: Task,
        service: Arc<dyn PlanningService>,
        config: &SessionConfig,
        events: SessionEvents,
        cmd_rx: mpsc::Receiver<SessionCommand>,
    ) {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let controller = Self {
            service,
            state: SessionState::new(task),
            debouncer: Debouncer::new(config.debounce),
            events,
            epoch: 0,
            internal_tx,
            load_waiters: Vec::new(),
            flush_waiters: Vec::new(),
            complete_waiter: None,
        };
        tokio::spawn(controller.run(cmd_rx, internal_rx));
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>, mut internal_rx: mpsc::UnboundedReceiver<Internal>) {
        let task_id = self.state.task().id;
        info!(%task_id, "Planning session started");

        loop {
            let flow = tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!(%task_id, "run: all handles dropped");
                        self.teardown();
                        Flow::Stop
                    }
                },
                Some(msg) = internal_rx.recv() => self.handle_internal(msg),
            };
            if flow == Flow::Stop {
                break;
            }
        }

        info!(%task_id, "Planning session ended");
    }

    fn handle_command(&mut self, cmd: SessionCommand) -> Flow {
        match cmd {
            SessionCommand::Load { reply } => self.load(reply),
            SessionCommand::SetAnswer {
                question_id,
                value,
                reply,
            } => {
                let _ = reply.send(self.set_answer(question_id, value));
            }
            SessionCommand::Complete { reply } => self.start_development(reply),
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.state.snapshot()));
            }
            SessionCommand::Flush { reply } => {
                if self.debouncer.is_idle() {
                    let _ = reply.send(self.flush_result());
                } else {
                    debug!(
                        pending = self.debouncer.pending_count(),
                        in_flight = self.debouncer.in_flight(),
                        "flush: waiting"
                    );
                    self.flush_waiters.push(reply);
                }
            }
            SessionCommand::Close { reply } => {
                self.teardown();
                let _ = reply.send(Ok(()));
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn handle_internal(&mut self, msg: Internal) -> Flow {
        match msg {
            Internal::LoadFinished { result } => self.on_load_finished(result),
            Internal::TimerFired {
                epoch,
                question_id,
                value,
                generation,
            } => self.on_timer_fired(epoch, question_id, value, generation),
            Internal::SaveFinished {
                epoch,
                question_id,
                generation,
                result,
            } => self.on_save_finished(epoch, question_id, generation, result),
            Internal::CompleteFinished { epoch, result } => {
                if epoch != self.epoch {
                    debug!(epoch, current = self.epoch, "CompleteFinished: stale epoch, ignoring");
                    return Flow::Continue;
                }
                return self.on_complete_finished(result);
            }
        }
        Flow::Continue
    }

    fn load(&mut self, reply: oneshot::Sender<SessionResponse<SessionSnapshot>>) {
        let task_id = self.state.task().id;
        let status = self.state.task().status;
        if !status.can_plan() {
            let err = SessionError::NotPlannable(status);
            warn!(%task_id, %status, "load: task not plannable");
            self.raise(ErrorKind::Load, err.to_string(), |s, m| s.fail_load(m));
            let _ = reply.send(Err(err));
            return;
        }
        if self.state.is_submitting() {
            let _ = reply.send(Err(SessionError::CompletionInFlight));
            return;
        }

        self.load_waiters.push(reply);
        if self.state.is_loading() {
            debug!(waiters = self.load_waiters.len(), "load: joining load in progress");
            return;
        }

        self.state.begin_load();
        self.events.emit(SessionEvent::LoadStarted);

        let service = self.service.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = service.start_planning(task_id).await;
            let _ = tx.send(Internal::LoadFinished { result });
        });
    }

    fn on_load_finished(&mut self, result: Result<StartPlanningResponse, ServiceError>) {
        let result = result.and_then(|resp| SessionState::validate_load(&resp).map(|()| resp));
        let waiters = std::mem::take(&mut self.load_waiters);

        match result {
            Ok(resp) => {
                let cancelled = self.debouncer.reset();
                self.epoch += 1;
                self.state.apply_load(resp);

                let snapshot = self.state.snapshot();
                info!(
                    task_id = %snapshot.task_id,
                    questions = snapshot.questions.len(),
                    answers = snapshot.answers.len(),
                    cancelled,
                    "Planning questions loaded"
                );
                self.events.emit(SessionEvent::Loaded {
                    question_count: snapshot.questions.len(),
                    answer_count: snapshot.answers.len(),
                    is_complete: snapshot.is_complete,
                });
                for waiter in waiters {
                    let _ = waiter.send(Ok(snapshot.clone()));
                }
                self.resolve_flush_waiters();
            }
            Err(e) => {
                warn!(error = %e, "Failed to load planning session");
                self.raise(ErrorKind::Load, e.to_string(), |s, m| s.fail_load(m));
                let err = SessionError::Load(Arc::new(e));
                for waiter in waiters {
                    let _ = waiter.send(Err(err.clone()));
                }
            }
        }
    }

    fn set_answer(&mut self, question_id: String, value: String) -> SessionResponse<()> {
        self.state.set_answer(&question_id, value.clone())?;
        let generation = self.debouncer.schedule(&question_id, value, self.epoch, &self.internal_tx);
        debug!(question_id = %question_id, generation, "set_answer: scheduled save");

        self.events.emit(SessionEvent::AnswerChanged {
            question_id: question_id.clone(),
        });
        self.events.emit(SessionEvent::SaveStateChanged {
            question_id,
            state: SaveState::Saving,
        });
        Ok(())
    }

    fn on_timer_fired(&mut self, epoch: u64, question_id: String, value: String, generation: u64) {
        if epoch != self.epoch || !self.debouncer.take_fired(&question_id, generation) {
            debug!(question_id = %question_id, generation, "on_timer_fired: superseded, ignoring");
            return;
        }
        self.debouncer.mark_issued(&question_id, generation);
        spawn_persist(
            self.service.clone(),
            self.state.task().id,
            self.epoch,
            question_id,
            value,
            generation,
            self.internal_tx.clone(),
        );
    }

    fn on_save_finished(
        &mut self,
        epoch: u64,
        question_id: String,
        generation: u64,
        result: Result<SavePlanAnswersResponse, ServiceError>,
    ) {
        if epoch != self.epoch {
            debug!(question_id = %question_id, epoch, current = self.epoch, "on_save_finished: stale epoch");
            return;
        }

        let outcome = self.debouncer.settle(&question_id, generation);
        debug!(question_id = %question_id, generation, ?outcome, "on_save_finished: called");
        if outcome != SaveOutcome::Stale {
            let settles = outcome == SaveOutcome::Latest;
            match result {
                Ok(resp) => {
                    if self.state.apply_save_success(&question_id, resp, settles) {
                        let snapshot = self.state.snapshot();
                        self.events.emit(SessionEvent::PlanUpdated {
                            is_complete: snapshot.is_complete,
                            has_summary: snapshot.plan_summary.is_some(),
                        });
                    }
                    if settles {
                        self.events.emit(SessionEvent::SaveStateChanged {
                            question_id,
                            state: SaveState::Saved,
                        });
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    if self.state.apply_save_failure(&question_id, &message, settles) {
                        warn!(question_id = %question_id, error = %e, "Answer save failed");
                        self.events.emit(SessionEvent::SaveStateChanged {
                            question_id,
                            state: SaveState::Error,
                        });
                        self.events.emit(SessionEvent::ErrorRaised {
                            kind: ErrorKind::Save,
                            message,
                        });
                    }
                }
            }
        }

        self.resolve_flush_waiters();
    }

    fn start_development(&mut self, reply: oneshot::Sender<SessionResponse<CompletePlanningResponse>>) {
        if self.state.is_submitting() || self.complete_waiter.is_some() {
            debug!("start_development: already submitting");
            let _ = reply.send(Err(SessionError::CompletionInFlight));
            return;
        }
        if let Some(reason) = self.state.start_blocker() {
            debug!(reason, "start_development: not ready");
            let _ = reply.send(Err(SessionError::NotReady(reason.to_string())));
            return;
        }

        self.state.begin_complete();
        self.complete_waiter = Some(reply);
        self.events.emit(SessionEvent::CompletionStarted);

        let service = self.service.clone();
        let task_id = self.state.task().id;
        let epoch = self.epoch;
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = service.complete_planning(task_id).await;
            let _ = tx.send(Internal::CompleteFinished { epoch, result });
        });
    }

    fn on_complete_finished(&mut self, result: Result<CompletePlanningResponse, ServiceError>) -> Flow {
        let waiter = self.complete_waiter.take();

        match result {
            Ok(resp) => {
                self.state.apply_complete_success(&resp);
                info!(task_id = %self.state.task().id, "Planning completed");
                self.events.emit(SessionEvent::Resolved {
                    plan_summary: resp.plan_summary.clone(),
                });
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Ok(resp));
                }
                self.teardown();
                Flow::Stop
            }
            Err(e) => {
                warn!(error = %e, "Failed to complete planning");
                self.raise(ErrorKind::Completion, e.to_string(), |s, m| s.fail_complete(m));
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(SessionError::Completion(Arc::new(e))));
                }
                Flow::Continue
            }
        }
    }

    /// Record a banner error on the state and announce it
    fn raise(&mut self, kind: ErrorKind, message: String, apply: impl FnOnce(&mut SessionState, String)) {
        apply(&mut self.state, message.clone());
        self.events.emit(SessionEvent::ErrorRaised { kind, message });
    }

    /// Outcome reported to flush callers once the persister is idle
    fn flush_result(&self) -> SessionResponse<()> {
        match self.state.error() {
            Some(banner) if banner.kind == ErrorKind::Save => Err(SessionError::Save(banner.message.clone())),
            _ => Ok(()),
        }
    }

    fn resolve_flush_waiters(&mut self) {
        if !self.debouncer.is_idle() || self.flush_waiters.is_empty() {
            return;
        }
        let result = self.flush_result();
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }

    /// Cancel timers, invalidate in-flight work, and release waiters
    fn teardown(&mut self) {
        let cancelled = self.debouncer.reset();
        self.epoch += 1;
        debug!(cancelled, epoch = self.epoch, "teardown: called");

        for waiter in self.load_waiters.drain(..) {
            let _ = waiter.send(Err(SessionError::Closed));
        }
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(Err(SessionError::Closed));
        }
        if let Some(waiter) = self.complete_waiter.take() {
            let _ = waiter.send(Err(SessionError::Closed));
        }
        self.events.emit(SessionEvent::Closed {
            cancelled_timers: cancelled,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::domain::{PlanAnswer, SaveState, Task, TaskStatus};
    use crate::service::mock::{MockPlanningService, save_response, start_response};
    use crate::service::{CompletePlanningResponse, ServiceError};
    use crate::session::{ErrorKind, PlanningSession, SessionConfig, SessionError, SessionEvent};

    fn mock() -> Arc<MockPlanningService> {
        Arc::new(MockPlanningService::new(Task::new("Add CSV export")))
    }

    fn open(mock: &Arc<MockPlanningService>) -> PlanningSession {
        PlanningSession::open(mock.task(), mock.clone(), SessionConfig::default())
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn api_error(status: u16, message: &str) -> ServiceError {
        ServiceError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_seeds_existing_answers() {
        let mock = mock();
        let mut resp = start_response();
        resp.existing_answers = vec![PlanAnswer::new("q2", "Mobile")];
        mock.script_start(Duration::ZERO, Ok(resp));

        let session = open(&mock);
        let snap = session.load().await.unwrap();

        assert_eq!(snap.questions.len(), 3);
        assert_eq!(snap.answer("q2"), Some("Mobile"));
        assert_eq!(snap.save_state("q2"), SaveState::Saved);
        assert_eq!(snap.save_state("q1"), SaveState::Idle);
        assert!(!snap.can_start_development);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_not_plannable_skips_service() {
        let mock = Arc::new(MockPlanningService::new(
            Task::new("Shipped").with_status(TaskStatus::Done),
        ));
        let session = open(&mock);

        let err = session.load().await.unwrap_err();
        assert!(matches!(err, SessionError::NotPlannable(TaskStatus::Done)));
        assert_eq!(mock.start_calls(), 0);

        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.error.map(|e| e.kind), Some(ErrorKind::Load));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_request() {
        let mock = mock();
        mock.script_start(Duration::from_millis(100), Ok(start_response()));
        let session = open(&mock);

        let (a, b) = tokio::join!(session.load(), session.load());
        assert_eq!(a.unwrap().questions.len(), 3);
        assert_eq!(b.unwrap().questions.len(), 3);
        assert_eq!(mock.start_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reload_keeps_prior_state() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();
        session.set_answer("q1", "Happy-path details").await.unwrap();
        advance(600).await;

        mock.script_start(Duration::ZERO, Err(api_error(500, "generation failed")));
        let err = session.load().await.unwrap_err();
        assert!(matches!(err, SessionError::Load(_)));

        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.questions.len(), 3);
        assert_eq!(snap.answer("q1"), Some("Happy-path details"));
        assert!(!snap.is_loading);
        let banner = snap.error.unwrap();
        assert_eq!(banner.kind, ErrorKind::Load);
        assert!(banner.message.contains("generation failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_question_ids_fail_load() {
        let mock = mock();
        let mut resp = start_response();
        resp.questions.push(resp.questions[0].clone());
        mock.script_start(Duration::ZERO, Ok(resp));
        let session = open(&mock);

        let err = session.load().await.unwrap_err();
        assert!(matches!(err.service_error(), Some(ServiceError::InvalidResponse(_))));
        assert!(session.snapshot().await.unwrap().questions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_question_rejected() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();

        let err = session.set_answer("q99", "x").await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownQuestion(id) if id == "q99"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_coalesce_into_one_save() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();

        session.set_answer("q1", "E").await.unwrap();
        assert_eq!(session.snapshot().await.unwrap().save_state("q1"), SaveState::Saving);
        advance(100).await;
        session.set_answer("q1", "Ed").await.unwrap();
        advance(100).await;
        session.set_answer("q1", "Edge cases").await.unwrap();

        advance(450).await;
        assert!(mock.saved().is_empty());

        advance(100).await;
        assert_eq!(mock.saved(), vec![PlanAnswer::new("q1", "Edge cases")]);
        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.save_state("q1"), SaveState::Saved);
        assert!(snap.can_start_development);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_question_saves_independently() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();

        session.set_answer("q1", "Edge cases").await.unwrap();
        session.set_answer("q2", "Desktop").await.unwrap();
        advance(600).await;

        let mut saved = mock.saved();
        saved.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        assert_eq!(
            saved,
            vec![PlanAnswer::new("q1", "Edge cases"), PlanAnswer::new("q2", "Desktop")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_response_keeps_field_saving() {
        let mock = mock();
        mock.script_save(Duration::from_millis(200), Ok(save_response(true, Some("## Partial"))));
        let session = open(&mock);
        session.load().await.unwrap();

        session.set_answer("q1", "a").await.unwrap();
        advance(600).await;
        session.set_answer("q1", "ab").await.unwrap();
        advance(200).await;

        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.save_state("q1"), SaveState::Saving);
        assert!(snap.is_complete);
        assert_eq!(snap.plan_summary.as_deref(), Some("## Partial"));

        advance(400).await;
        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.save_state("q1"), SaveState::Saved);
        assert!(!snap.is_complete);
        assert_eq!(snap.plan_summary.as_deref(), Some("## Partial"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_response_is_ignored() {
        let mock = mock();
        mock.script_save(Duration::from_millis(1000), Err(api_error(500, "slow failure")));
        mock.script_save(Duration::from_millis(10), Ok(save_response(false, None)));
        let session = open(&mock);
        session.load().await.unwrap();

        session.set_answer("q1", "first").await.unwrap();
        advance(600).await;
        session.set_answer("q1", "second").await.unwrap();
        advance(600).await;
        assert_eq!(session.snapshot().await.unwrap().save_state("q1"), SaveState::Saved);

        advance(500).await;
        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.save_state("q1"), SaveState::Saved);
        assert_eq!(snap.answer("q1"), Some("second"));
        assert!(snap.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_flags_field_and_keeps_value() {
        let mock = mock();
        mock.script_save(Duration::ZERO, Err(api_error(500, "database locked")));
        let session = open(&mock);
        session.load().await.unwrap();

        session.set_answer("q1", "Edge cases").await.unwrap();
        let err = session.flush().await.unwrap_err();
        assert!(matches!(err, SessionError::Save(ref m) if m.contains("database locked")));
        assert_eq!(err.to_string(), "Failed to save answer: API error 500: database locked");

        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.save_state("q1"), SaveState::Error);
        assert_eq!(snap.answer("q1"), Some("Edge cases"));
        let banner = snap.error.as_ref().unwrap();
        assert_eq!(banner.kind, ErrorKind::Save);
        assert_eq!(banner.message, "API error 500: database locked");

        // Editing again retries and clears the banner
        session.set_answer("q1", "Edge cases only").await.unwrap();
        session.flush().await.unwrap();
        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.save_state("q1"), SaveState::Saved);
        assert!(snap.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_save_after_reload_is_ignored() {
        let mock = mock();
        mock.script_save(Duration::from_millis(1000), Ok(save_response(true, Some("## Stale"))));
        let session = open(&mock);
        session.load().await.unwrap();

        session.set_answer("q1", "x").await.unwrap();
        advance(600).await;
        assert_eq!(mock.saved().len(), 1);

        session.load().await.unwrap();
        advance(1000).await;

        let snap = session.snapshot().await.unwrap();
        assert_eq!(snap.save_state("q1"), SaveState::Idle);
        assert!(snap.answer("q1").is_none());
        assert!(!snap.is_complete);
        assert!(snap.plan_summary.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_cancels_pending_timers() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();

        session.set_answer("q1", "never sent").await.unwrap();
        session.load().await.unwrap();
        advance(1000).await;

        assert!(mock.saved().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_saves() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();
        let mut events = session.subscribe();

        session.set_answer("q1", "draft").await.unwrap();
        session.close().await.unwrap();
        advance(1000).await;

        assert!(mock.saved().is_empty());
        assert!(matches!(session.set_answer("q1", "more").await, Err(SessionError::Closed)));
        assert!(session.close().await.is_ok());

        let mut closed = None;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Closed { cancelled_timers } = event {
                closed = Some(cancelled_timers);
            }
        }
        assert_eq!(closed, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_tears_down() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();
        let mut events = session.subscribe();

        session.set_answer("q1", "draft").await.unwrap();
        drop(session);

        let mut cancelled = None;
        while let Ok(event) = events.recv().await {
            if let SessionEvent::Closed { cancelled_timers } = event {
                cancelled = Some(cancelled_timers);
            }
        }
        assert_eq!(cancelled, Some(1));

        advance(1000).await;
        assert!(mock.saved().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_development_requires_gate() {
        let mock = mock();
        let session = open(&mock);

        let err = session.start_development().await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady(_)));

        session.load().await.unwrap();
        let err = session.start_development().await.unwrap_err();
        assert!(matches!(err, SessionError::NotReady(ref r) if r.contains("required")));

        session.set_answer("q1", "   ").await.unwrap();
        assert!(matches!(
            session.start_development().await,
            Err(SessionError::NotReady(_))
        ));
        assert_eq!(mock.complete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_development_calls_service_once() {
        let mock = mock();
        mock.script_complete(
            Duration::from_millis(100),
            Ok(CompletePlanningResponse {
                task_status: Some(TaskStatus::InProgress),
                plan_summary: "## Final plan".to_string(),
                sync_info: None,
            }),
        );
        let session = open(&mock);
        session.load().await.unwrap();
        session.set_answer("q1", "Edge cases").await.unwrap();
        session.flush().await.unwrap();

        let mut events = session.subscribe();
        let (first, second) = tokio::join!(session.start_development(), session.start_development());

        assert_eq!(first.unwrap().plan_summary, "## Final plan");
        assert!(matches!(second, Err(SessionError::CompletionInFlight)));
        assert_eq!(mock.complete_calls(), 1);

        let mut resolved = None;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Resolved { plan_summary } = event {
                resolved = Some(plan_summary);
            }
        }
        assert_eq!(resolved.as_deref(), Some("## Final plan"));

        // The session closes once it resolves
        assert!(matches!(session.snapshot().await, Err(SessionError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_failure_allows_retry() {
        let mock = mock();
        mock.script_complete(
            Duration::ZERO,
            Err(api_error(400, "Please answer all required questions before starting development")),
        );
        let session = open(&mock);
        session.load().await.unwrap();
        session.set_answer("q1", "Edge cases").await.unwrap();

        let err = session.start_development().await.unwrap_err();
        assert!(matches!(err, SessionError::Completion(_)));

        let snap = session.snapshot().await.unwrap();
        assert!(!snap.is_submitting);
        assert!(snap.can_start_development);
        assert_eq!(snap.error.map(|e| e.kind), Some(ErrorKind::Completion));

        let resp = session.start_development().await.unwrap();
        assert_eq!(resp.task_status, Some(TaskStatus::InProgress));
        assert_eq!(mock.complete_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_events_in_order() {
        let mock = mock();
        let session = open(&mock);
        session.load().await.unwrap();
        let mut events = session.subscribe();

        session.set_answer("q2", "Desktop").await.unwrap();
        session.flush().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                SessionEvent::AnswerChanged {
                    question_id: "q2".to_string()
                },
                SessionEvent::SaveStateChanged {
                    question_id: "q2".to_string(),
                    state: SaveState::Saving
                },
                SessionEvent::SaveStateChanged {
                    question_id: "q2".to_string(),
                    state: SaveState::Saved
                },
            ]
        );
    }
}
