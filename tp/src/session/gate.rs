//! Completion gate
//!
//! Client-side check that enables "start development". It never marks a plan
//! complete by itself; only the planning service decides that.

use std::collections::HashMap;

use crate::domain::ClarificationQuestion;

/// Whether every required question has a non-blank answer
///
/// With no required questions the gate passes as soon as any answer exists,
/// so an untouched form can never be finalized.
pub fn all_required_answered(questions: &[ClarificationQuestion], answers: &HashMap<String, String>) -> bool {
    let mut required = questions.iter().filter(|q| q.required).peekable();

    if required.peek().is_none() {
        return !answers.is_empty();
    }

    required.all(|q| answers.get(&q.id).is_some_and(|a| !a.trim().is_empty()))
}
