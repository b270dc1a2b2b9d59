//! Domain types for clarification planning
//!
//! - [`Task`] / [`TaskStatus`] - the external task a planning session belongs to
//! - [`ClarificationQuestion`] - a question the planning service wants answered
//! - [`PlanAnswer`] - one answer as exchanged with the planning service
//! - [`SaveState`] - per-question persistence status

mod answer;
mod question;
mod task;

pub use answer::{PlanAnswer, SaveState};
pub use question::{AnswerInput, ClarificationQuestion, QuestionCategory};
pub use task::{Task, TaskStatus};
