//! CLI command definitions and terminal rendering

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{AnswerInput, ClarificationQuestion, SaveState};
use crate::service::ServiceError;
use crate::session::{SessionEvent, SessionSnapshot};

/// taskplan - clarification planning for tasks
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Answer clarification questions and complete task planning",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start or resume planning interactively
    Plan {
        /// Task to plan (required unless --offline)
        #[arg(value_name = "TASK_ID", required_unless_present = "offline")]
        task_id: Option<Uuid>,

        /// Plan against an in-process service instead of the task server
        #[arg(long)]
        offline: bool,

        /// Title of the offline task
        #[arg(short, long, requires = "offline")]
        title: Option<String>,

        /// Description of the offline task
        #[arg(short, long, requires = "offline")]
        description: Option<String>,

        /// Start development without asking once all required questions are answered
        #[arg(short, long)]
        yes: bool,
    },

    /// Show questions, answers and the plan summary
    Show {
        #[arg(value_name = "TASK_ID")]
        task_id: Uuid,
    },

    /// Save one answer
    Answer {
        #[arg(value_name = "TASK_ID")]
        task_id: Uuid,

        /// Question identifier (e.g. q1)
        question_id: String,

        /// Answer text, or the number of a suggested answer
        answer: String,
    },

    /// Complete planning and move the task into development
    Complete {
        #[arg(value_name = "TASK_ID")]
        task_id: Uuid,
    },
}

/// Path of the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskplan")
        .join("logs")
        .join("taskplan.log")
}

/// Generate the after_help text
pub fn generate_after_help() -> String {
    format!("Logs are written to: {}\n", get_log_path().display())
}

/// Interpret a line typed for a question
///
/// A blank line skips the question. For choice questions a number selects the
/// matching suggestion; any other text is taken as a free-form answer.
pub fn resolve_answer(question: &ClarificationQuestion, input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let AnswerInput::Choice(options) = question.input_kind()
        && let Ok(n) = input.parse::<usize>()
        && (1..=options.len()).contains(&n)
    {
        debug!(question_id = %question.id, choice = n, "resolve_answer: selected suggestion");
        return Some(options[n - 1].clone());
    }

    Some(input.to_string())
}

/// Render a question with its options and current answer
pub fn render_question(index: usize, question: &ClarificationQuestion, answer: Option<&str>) -> String {
    let marker = if question.required { " *".red().to_string() } else { String::new() };
    let mut out = format!(
        "{}. {}{} {}\n",
        index + 1,
        question.question.bold(),
        marker,
        format!("[{}]", question.category).dimmed()
    );

    if let AnswerInput::Choice(options) = question.input_kind() {
        for (i, option) in options.iter().enumerate() {
            out.push_str(&format!("   {}) {}\n", i + 1, option));
        }
    }
    if let Some(answer) = answer {
        out.push_str(&format!("   current: {}\n", answer.cyan()));
    }
    out
}

fn save_label(state: SaveState) -> String {
    match state.helper_text() {
        None => String::new(),
        Some(text) => match state {
            SaveState::Saved => text.green().to_string(),
            SaveState::Error => text.red().to_string(),
            _ => text.yellow().to_string(),
        },
    }
}

/// Render answers, save states, banner and readiness
pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let mut out = format!("{} {}\n", "Task:".bold(), snapshot.task_title);

    if let Some(banner) = &snapshot.error {
        out.push_str(&format!("{} {}\n", "✗".red(), banner.message.red()));
    }

    for question in &snapshot.questions {
        let answer = snapshot.answer(&question.id).unwrap_or("-");
        let label = save_label(snapshot.save_state(&question.id));
        out.push_str(&format!("  {:<4} {} {}\n", question.id, answer, label));
    }

    let (answered, required) = snapshot.required_progress();
    out.push_str(&format!("Required answered: {}/{}\n", answered, required));

    if snapshot.can_start_development {
        out.push_str(&format!("{} Ready to start development\n", "✓".green()));
    } else {
        out.push_str(&format!("{} Answer all required questions to continue\n", "…".yellow()));
    }
    out
}

/// Render a live session event, if it is worth a line on the terminal
pub fn render_event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::SaveStateChanged { question_id, state } => match state {
            SaveState::Saved => Some(format!("  {} {} {}", "✓".green(), question_id, "saved".dimmed())),
            SaveState::Error => Some(format!("  {} {} {}", "✗".red(), question_id, save_label(*state))),
            SaveState::Idle | SaveState::Saving => None,
        },
        SessionEvent::ErrorRaised { message, .. } => Some(format!("{} {}", "✗".red(), message.red())),
        _ => None,
    }
}

/// Explain a planning service failure to the user
///
/// Refusals by the task server are reported as such; anything else points at
/// the connection.
pub fn describe_service_failure(action: &str, err: &ServiceError) -> String {
    match (err.is_rejection(), err.status()) {
        (true, Some(404)) => format!("{} failed: the task server does not know this task ({})", action, err),
        (true, _) => format!("{} was rejected by the task server: {}", action, err),
        (false, _) => format!(
            "{} failed: {}. Check that the task server is running at the configured base-url",
            action, err
        ),
    }
}
