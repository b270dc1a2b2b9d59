//! Answer and save-status types

use serde::{Deserialize, Serialize};

/// One answer as exchanged with the planning service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAnswer {
    pub question_id: String,
    pub answer: String,
}

impl PlanAnswer {
    pub fn new(question_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            answer: answer.into(),
        }
    }
}

/// Persistence status of a single answer field
///
/// `Saving` is entered optimistically as soon as the user edits, before the
/// debounce window elapses. `Saved` and `Error` are only set from a save
/// response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl SaveState {
    /// Short status line shown under a field, if any
    pub fn helper_text(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Saving => Some("Saving..."),
            Self::Saved => Some("Saved"),
            Self::Error => Some("Could not save answer"),
        }
    }
}

impl std::fmt::Display for SaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_text() {
        assert_eq!(SaveState::Idle.helper_text(), None);
        assert_eq!(SaveState::Saving.helper_text(), Some("Saving..."));
        assert_eq!(SaveState::Saved.helper_text(), Some("Saved"));
        assert_eq!(SaveState::Error.helper_text(), Some("Could not save answer"));
    }

    #[test]
    fn test_plan_answer_wire_format() {
        let json = serde_json::to_string(&PlanAnswer::new("q1", "ship it")).unwrap();
        assert_eq!(json, r#"{"question_id":"q1","answer":"ship it"}"#);
    }
}
