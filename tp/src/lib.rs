//! taskplan - clarification planning for tasks
//!
//! Before development starts on a task, the planning service generates a set
//! of clarification questions. taskplan runs the client side of that exchange:
//! it loads the questions, collects answers, saves each answer shortly after
//! the user stops editing it, and asks the service to complete the plan once
//! every required question is answered.
//!
//! # Modules
//!
//! - [`domain`] - Tasks, questions, answers and save states
//! - [`service`] - Planning service trait with HTTP and in-memory implementations
//! - [`session`] - Planning session controller (actor, debounced saves, completion)
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod service;
pub mod session;

pub use config::Config;
pub use domain::{AnswerInput, ClarificationQuestion, PlanAnswer, QuestionCategory, SaveState, Task, TaskStatus};
pub use service::{HttpPlanningService, InMemoryPlanningService, PlanningService, ServiceError};
pub use session::{PlanningSession, SessionConfig, SessionError, SessionEvent, SessionSnapshot};
