//! Planning session controller
//!
//! A [`PlanningSession`] drives the clarification flow for one task: it loads
//! the question set, keeps the user's answers, persists each edited answer
//! after a quiet period, and finally asks the planning service to complete
//! the plan.
//!
//! # Architecture
//!
//! ```text
//!  PlanningSession (handle, Clone)
//!        │  SessionCommand + oneshot reply
//!        ▼
//!  ┌──────────────────────────────┐      spawned tasks
//!  │ controller actor             │◄──── debounce timers (TimerFired)
//!  │  SessionState  (answers,     │◄──── start_planning   (LoadFinished)
//!  │   save states, summary)      │◄──── save_plan_answers (SaveFinished)
//!  │  Debouncer (timer table)     │◄──── complete_planning (CompleteFinished)
//!  └──────────────────────────────┘
//!        │ SessionEvent (broadcast)
//!        ▼
//!   subscribers (save progress lines in `tp plan`)
//! ```
//!
//! Only the actor mutates session state. Network calls and timers run as
//! separate tasks and report back through the actor's internal channel; every
//! report carries the session epoch so results that outlive a reload or
//! teardown are dropped.

use std::time::Duration;

mod controller;
mod events;
mod gate;
mod handle;
mod messages;
mod persister;
mod state;

pub use events::{SessionEvent, SessionEvents};
pub use gate::all_required_answered;
pub use handle::PlanningSession;
pub use messages::{SessionError, SessionResponse};
pub use state::{ErrorBanner, ErrorKind, SessionSnapshot};

/// Default quiet period before an edited answer is persisted
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default capacity of the session event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a planning session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period after the last edit of a question before it is saved
    pub debounce: Duration,

    /// Buffer size of the broadcast event channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
