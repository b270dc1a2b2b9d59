//! taskplan - clarification planning for tasks
//!
//! CLI entry point for answering planning questions and completing plans.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result, eyre};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskplan::cli::{
    Cli, Command, describe_service_failure, generate_after_help, get_log_path, render_event, render_question,
    render_status, resolve_answer,
};
use taskplan::config::Config;
use taskplan::domain::Task;
use taskplan::service::{HttpPlanningService, InMemoryPlanningService, PlanningService};
use taskplan::session::{PlanningSession, SessionError, SessionSnapshot};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("taskplan loaded config: service={}", config.service.base_url);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan {
            task_id,
            offline,
            title,
            description,
            yes,
        } => {
            debug!(?task_id, offline, yes, "main: matched Plan command");
            let session = if offline {
                open_offline(&config, title, description)
            } else {
                let task_id = task_id.ok_or_else(|| eyre!("TASK_ID is required unless --offline is given"))?;
                open_remote(&config, task_id).await?
            };
            cmd_plan(session, yes).await
        }
        Command::Show { task_id } => {
            debug!(%task_id, "main: matched Show command");
            cmd_show(open_remote(&config, task_id).await?).await
        }
        Command::Answer {
            task_id,
            question_id,
            answer,
        } => {
            debug!(%task_id, %question_id, "main: matched Answer command");
            cmd_answer(open_remote(&config, task_id).await?, &question_id, &answer).await
        }
        Command::Complete { task_id } => {
            debug!(%task_id, "main: matched Complete command");
            cmd_complete(open_remote(&config, task_id).await?).await
        }
    }
}

/// Open a session for a task held by the task server
async fn open_remote(config: &Config, task_id: Uuid) -> Result<PlanningSession> {
    debug!(%task_id, base_url = %config.service.base_url, "open_remote: called");
    let service: Arc<dyn PlanningService> = Arc::new(HttpPlanningService::from_config(&config.service)?);
    PlanningSession::open_task(task_id, service, config.session.to_session_config())
        .await
        .map_err(|e| session_failure(&format!("Opening task {}", task_id), e))
}

/// Open a session for a fresh task planned in-process
fn open_offline(config: &Config, title: Option<String>, description: Option<String>) -> PlanningSession {
    let mut task = Task::new(title.unwrap_or_else(|| "Untitled task".to_string()));
    if let Some(description) = description {
        task = task.with_description(description);
    }
    debug!(task_id = %task.id, "open_offline: called");

    let service = Arc::new(InMemoryPlanningService::default());
    service.insert_task(task.clone());
    PlanningSession::open(task, service, config.session.to_session_config())
}

/// Turn a session error into a report, explaining service failures
fn session_failure(action: &str, err: SessionError) -> eyre::Report {
    match err.service_error() {
        Some(service) => eyre!("{}", describe_service_failure(action, service)),
        None => err.into(),
    }
}

/// Print save progress and banners while the user is typing
fn watch_events(session: &PlanningSession) -> JoinHandle<()> {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = render_event(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "watch_events: lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn load(session: &PlanningSession) -> Result<SessionSnapshot> {
    println!("{}", "Generating clarification questions...".dimmed());
    let snapshot = session
        .load()
        .await
        .map_err(|e| session_failure("Loading questions", e))?;
    println!(
        "{} Loaded {} questions for: {}",
        "✓".green(),
        snapshot.questions.len(),
        snapshot.task_title.cyan()
    );
    Ok(snapshot)
}

/// Wait for pending saves; a failed save is reported but not fatal
async fn flush(session: &PlanningSession) -> Result<()> {
    match session.flush().await {
        Ok(()) => Ok(()),
        Err(SessionError::Save(message)) => {
            warn!(%message, "flush: save failed");
            eprintln!("{} {}", "✗".red(), message);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

/// Walk through every question, then offer to start development
async fn cmd_plan(session: PlanningSession, yes: bool) -> Result<()> {
    debug!(task_id = %session.task_id(), yes, "cmd_plan: called");
    let snapshot = load(&session).await?;
    println!("{}", "Enter a number to pick a suggestion, text to answer, or an empty line to skip.".dimmed());
    println!();

    let watcher = watch_events(&session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    for (index, question) in snapshot.questions.iter().enumerate() {
        print!("{}", render_question(index, question, snapshot.answer(&question.id)));
        let Some(line) = prompt(&mut lines, "> ").await? else {
            debug!("cmd_plan: stdin closed");
            break;
        };
        if let Some(answer) = resolve_answer(question, &line) {
            session.set_answer(&question.id, answer).await?;
        }
    }

    flush(&session).await?;
    watcher.abort();
    let snapshot = session.snapshot().await?;
    println!();
    print!("{}", render_status(&snapshot));

    if !snapshot.can_start_development {
        session.close().await?;
        println!("Answers saved. Resume with: tp plan {}", snapshot.task_id);
        return Ok(());
    }

    let proceed = yes
        || prompt(&mut lines, "Start development? [y/N] ")
            .await?
            .is_some_and(|line| matches!(line.trim().to_lowercase().as_str(), "y" | "yes"));

    if proceed {
        complete(&session).await
    } else {
        session.close().await?;
        println!("Answers saved. Resume with: tp plan {}", snapshot.task_id);
        Ok(())
    }
}

async fn complete(session: &PlanningSession) -> Result<()> {
    println!("{}", "Completing plan...".dimmed());
    let resp = session
        .start_development()
        .await
        .map_err(|e| session_failure("Completing planning", e))?;
    let status = resp.task_status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string());
    println!("{} Planning complete (status: {})", "✓".green(), status.cyan());
    if let Some(sync) = resp.sync_info.filter(|s| s.synced) {
        println!("  pulled {} commits", sync.commits_pulled);
    }
    println!();
    println!("{}", resp.plan_summary);
    Ok(())
}

async fn cmd_show(session: PlanningSession) -> Result<()> {
    debug!(task_id = %session.task_id(), "cmd_show: called");
    let snapshot = load(&session).await?;
    println!();
    for (index, question) in snapshot.questions.iter().enumerate() {
        print!("{}", render_question(index, question, snapshot.answer(&question.id)));
    }
    println!();
    print!("{}", render_status(&snapshot));

    if let Some(summary) = &snapshot.plan_summary {
        println!();
        println!("{}", summary);
    }
    session.close().await?;
    Ok(())
}

async fn cmd_answer(session: PlanningSession, question_id: &str, answer: &str) -> Result<()> {
    debug!(task_id = %session.task_id(), %question_id, "cmd_answer: called");
    let snapshot = session
        .load()
        .await
        .map_err(|e| session_failure("Loading questions", e))?;
    let question = snapshot
        .question(question_id)
        .ok_or_else(|| eyre!("Unknown question: {}", question_id))?;
    let value = resolve_answer(question, answer).ok_or_else(|| eyre!("Answer must not be empty"))?;

    session.set_answer(question_id, value.clone()).await?;
    session.flush().await?;

    let snapshot = session.snapshot().await?;
    println!(
        "{} {}: {} ({})",
        "✓".green(),
        question_id,
        value.cyan(),
        snapshot.save_state(question_id)
    );
    if snapshot.is_complete {
        println!("All required questions answered. Run: tp complete {}", snapshot.task_id);
    }
    session.close().await?;
    Ok(())
}

async fn cmd_complete(session: PlanningSession) -> Result<()> {
    debug!(task_id = %session.task_id(), "cmd_complete: called");
    let snapshot = session
        .load()
        .await
        .map_err(|e| session_failure("Loading questions", e))?;
    if !snapshot.can_start_development {
        print!("{}", render_status(&snapshot));
        session.close().await?;
        return Err(eyre!("Please answer all required questions before starting development"));
    }
    complete(&session).await
}
