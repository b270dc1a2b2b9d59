//! Clarification question types
//!
//! Questions are produced by the planning service and are immutable for the
//! lifetime of a session. The wire format uses camelCase keys.

use serde::{Deserialize, Serialize};

/// Topic a clarification question is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum QuestionCategory {
    Authentication,
    Security,
    Features,
    Performance,
    Ui,
    Integration,
    Other,
}

impl From<String> for QuestionCategory {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "authentication" => Self::Authentication,
            "security" => Self::Security,
            "features" => Self::Features,
            "performance" => Self::Performance,
            "ui" => Self::Ui,
            "integration" => Self::Integration,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Authentication => "authentication",
            Self::Security => "security",
            Self::Features => "features",
            Self::Performance => "performance",
            Self::Ui => "ui",
            Self::Integration => "integration",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A structured prompt the planning service wants answered before work begins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationQuestion {
    /// Unique within a session
    pub id: String,
    /// Prompt text shown to the user
    pub question: String,
    pub category: QuestionCategory,
    /// Must be answered before development can start
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub suggested_answers: Option<Vec<String>>,
}

/// How an answer should be collected for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerInput<'a> {
    /// Pick one of the suggested answers
    Choice(&'a [String]),
    /// Free-form text
    FreeText,
}

impl ClarificationQuestion {
    pub fn new(id: impl Into<String>, question: impl Into<String>, category: QuestionCategory) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            category,
            required: false,
            suggested_answers: None,
        }
    }

    /// Builder: mark the question as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: attach suggested answers
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_answers = Some(suggestions.into_iter().map(Into::into).collect());
        self
    }

    /// Choice when suggestions exist, free text otherwise
    pub fn input_kind(&self) -> AnswerInput<'_> {
        match self.suggested_answers.as_deref() {
            Some(options) if !options.is_empty() => AnswerInput::Choice(options),
            _ => AnswerInput::FreeText,
        }
    }
}
