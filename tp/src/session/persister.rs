//! Debounced answer persistence
//!
//! Each question owns at most one pending timer. A new edit aborts the
//! previous timer, so only the last value typed within the quiet period is
//! sent. Generations order edits and saves per question:
//!
//! - a timer fire is accepted only if it is still the question's timer
//! - a save response older than the newest issued save is stale
//! - only the response for the newest edit settles the field

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::messages::Internal;
use crate::service::{PlanningService, SavePlanAnswersRequest};

/// How a save response relates to the question's later activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveOutcome {
    /// Response to the newest edit; settles the field
    Latest,
    /// Newer edits exist but no newer save has been issued
    Superseded,
    /// A newer save was already issued; ignore entirely
    Stale,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Per-question debounce timers and save bookkeeping
pub(crate) struct Debouncer {
    delay: Duration,
    timers: HashMap<String, PendingTimer>,
    edit_generation: HashMap<String, u64>,
    issued_generation: HashMap<String, u64>,
    next_generation: u64,
    in_flight: usize,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timers: HashMap::new(),
            edit_generation: HashMap::new(),
            issued_generation: HashMap::new(),
            next_generation: 1,
            in_flight: 0,
        }
    }

    /// Restart the question's timer with a new value
    pub fn schedule(
        &mut self,
        question_id: &str,
        value: String,
        epoch: u64,
        tx: &mpsc::UnboundedSender<Internal>,
    ) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.edit_generation.insert(question_id.to_string(), generation);

        if let Some(previous) = self.timers.remove(question_id) {
            debug!(question_id, superseded = previous.generation, "schedule: restarting timer");
            previous.handle.abort();
        }

        let delay = self.delay;
        let tx = tx.clone();
        let id = question_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::TimerFired {
                epoch,
                question_id: id,
                value,
                generation,
            });
        });

        self.timers
            .insert(question_id.to_string(), PendingTimer { generation, handle });
        generation
    }

    /// Claim a fired timer; false when it was replaced or cancelled
    pub fn take_fired(&mut self, question_id: &str, generation: u64) -> bool {
        match self.timers.get(question_id) {
            Some(timer) if timer.generation == generation => {
                self.timers.remove(question_id);
                true
            }
            _ => false,
        }
    }

    /// Record that a save for this generation is on the wire
    pub fn mark_issued(&mut self, question_id: &str, generation: u64) {
        self.issued_generation.insert(question_id.to_string(), generation);
        self.in_flight += 1;
    }

    /// Classify a finished save and release its in-flight slot
    pub fn settle(&mut self, question_id: &str, generation: u64) -> SaveOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);

        let issued = self.issued_generation.get(question_id).copied().unwrap_or(0);
        if generation < issued {
            return SaveOutcome::Stale;
        }
        match self.edit_generation.get(question_id) {
            Some(latest) if *latest == generation => SaveOutcome::Latest,
            _ => SaveOutcome::Superseded,
        }
    }

    /// Abort every pending timer, returning how many were cancelled
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        for (question_id, timer) in self.timers.drain() {
            debug!(question_id = %question_id, generation = timer.generation, "cancel_all: aborting timer");
            timer.handle.abort();
        }
        count
    }

    /// Forget everything; used when the session epoch changes
    pub fn reset(&mut self) -> usize {
        let cancelled = self.cancel_all();
        self.edit_generation.clear();
        self.issued_generation.clear();
        self.in_flight = 0;
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// No timers waiting and no saves on the wire
    pub fn is_idle(&self) -> bool {
        self.timers.is_empty() && self.in_flight == 0
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if !self.timers.is_empty() {
            debug!(pending = self.timers.len(), "Debouncer::drop: aborting timers");
            self.cancel_all();
        }
    }
}

/// Send one answer to the planning service and report back to the controller
pub(crate) fn spawn_persist(
    service: Arc<dyn PlanningService>,
    task_id: Uuid,
    epoch: u64,
    question_id: String,
    value: String,
    generation: u64,
    tx: mpsc::UnboundedSender<Internal>,
) {
    tokio::spawn(async move {
        debug!(%task_id, question_id = %question_id, generation, "persist: sending answer");
        let request = SavePlanAnswersRequest::single(question_id.clone(), value);
        let result = service.save_plan_answers(task_id, request).await;
        if let Err(e) = &result {
            warn!(%task_id, question_id = %question_id, error = %e, "persist: save failed");
        }
        let _ = tx.send(Internal::SaveFinished {
            epoch,
            question_id,
            generation,
            result,
        });
    });
}
