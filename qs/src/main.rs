//! questionsync - live question/answer channel
//!
//! CLI entry point for watching and answering questions over the hub.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use questionsync::api::QuestionsApi;
use questionsync::cli::{Cli, Command, OutputFormat, get_log_path};
use questionsync::config::Config;
use questionsync::connection::{ConnectionConfig, ConnectionState};
use questionsync::domain::{AnswerOrigin, QuestionView};
use questionsync::hub::WebSocketTransport;
use questionsync::session::AdminSession;
use questionsync::store::StoreEvent;

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
    let cli = Cli::parse();

    // Log level from config file first, before the full load logs anything
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(hub = %config.hub.url, api = %config.api.base_url, "questionsync loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Watch { no_backfill }) => cmd_watch(&config, no_backfill).await,
        Some(Command::Answer {
            question_id,
            user_id,
            text,
            timeout,
        }) => cmd_answer(&config, &question_id, &user_id, &text, Duration::from_secs(timeout)).await,
        Some(Command::Questions { format }) => cmd_questions(&config, format).await,
        Some(Command::Config) => cmd_config(&config),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Session over the configured hub, optionally without REST backfill
fn build_session(config: &Config, with_api: bool) -> Result<AdminSession> {
    if with_api {
        return AdminSession::from_config(config);
    }
    let transport = WebSocketTransport::new(&config.hub).context("Failed to set up hub transport")?;
    Ok(AdminSession::new(transport, ConnectionConfig::from(&config.hub), None))
}

/// Stream questions and answers until Ctrl-C
async fn cmd_watch(config: &Config, no_backfill: bool) -> Result<()> {
    let session = build_session(config, !no_backfill)?;
    let mut events = session.store().subscribe_events();
    let mut states = session.connection().subscribe_state();

    let state = session.start().await?;
    println!("{} {} ({})", "Watching".green().bold(), config.hub.url, state);
    if !state.is_active() {
        println!("{} hub unreachable, showing history only", "Warning:".yellow());
    }

    for view in session.questions().await? {
        print_question(&view);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }

            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                print_state(state);
            }

            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(view) = session.store().get(event.question_id()).await? {
                        print_event(&event, &view);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch: lagged behind store events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.shutdown().await
}

/// Submit one answer and wait for its confirmation
async fn cmd_answer(config: &Config, question_id: &str, user_id: &str, text: &str, timeout: Duration) -> Result<()> {
    let session = build_session(config, false)?;
    let mut events = session.store().subscribe_events();

    let state = session.start().await?;
    if !state.is_connected() {
        tokio::time::timeout(timeout, session.connection().wait_for_state(ConnectionState::Connected))
            .await
            .map_err(|_| eyre!("Hub not reachable within {:?}", timeout))??;
    }

    if let Err(err) = session.submit_answer(question_id, user_id, text).await {
        if err.is_user_visible() {
            println!("{} {} ({})", "Not sent:".red().bold(), question_id, err);
        } else {
            warn!(%question_id, error = %err, "answer: internal failure");
        }
        return Err(err).context(format!("Failed to send answer for {}", question_id));
    }
    println!("{} answer for {}", "Sent".green(), question_id);

    let confirmed = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(StoreEvent::AnswerChanged {
                    question_id: id,
                    origin: AnswerOrigin::Confirmed,
                }) if id == question_id => return true,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);

    if confirmed {
        println!("{} by hub", "Confirmed".green().bold());
    } else {
        println!("{} no confirmation within {:?}", "Warning:".yellow(), timeout);
    }

    session.shutdown().await
}

/// List questions from the REST API
async fn cmd_questions(config: &Config, format: OutputFormat) -> Result<()> {
    let api = QuestionsApi::new(&config.api).context("Failed to set up questions API client")?;
    let questions = api.all_questions().await.context("Failed to fetch questions")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&questions)?),
        OutputFormat::Text => {
            if questions.is_empty() {
                println!("No questions");
            }
            for q in &questions {
                let id = q.question_id.as_deref().unwrap_or("?");
                println!("{} [{}] {}", id.cyan(), q.user_id.dimmed(), q.text);
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn print_question(view: &QuestionView) {
    let q = &view.question;
    println!(
        "{} {} [{}] {}",
        q.received_at.format("%H:%M:%S").to_string().dimmed(),
        q.question_id.cyan(),
        q.user_id.dimmed(),
        q.text
    );
    if let Some(answer) = &view.answer {
        println!("    {} {} ({})", "->".green(), answer.answer, answer.origin);
    }
}

fn print_event(event: &StoreEvent, view: &QuestionView) {
    match event {
        StoreEvent::QuestionAdded { .. } => print_question(view),
        StoreEvent::AnswerChanged { question_id, origin } => {
            let text = view.answer_text().unwrap_or("");
            let label = match origin {
                AnswerOrigin::Confirmed => "answered".green(),
                AnswerOrigin::Optimistic => "answering".yellow(),
            };
            println!("{} {} {}", question_id.cyan(), label, text);
        }
        StoreEvent::AnswerRolledBack { question_id } => {
            println!("{} {}", question_id.cyan(), "answer not sent".red());
        }
    }
}

fn print_state(state: ConnectionState) {
    let label = match state {
        ConnectionState::Connected => state.to_string().green(),
        ConnectionState::Connecting | ConnectionState::Reconnecting => state.to_string().yellow(),
        ConnectionState::Disconnected => state.to_string().red(),
    };
    println!("{} {}", "hub".dimmed(), label);
}
