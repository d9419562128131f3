//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// questionsync - live question/answer channel for admin dashboards
#[derive(Parser)]
#[command(
    name = "qs",
    about = "Watch and answer end-user questions over the live hub channel",
    version,
    after_help = "Logs are written to: ~/.local/share/questionsync/logs/questionsync.log"
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
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect, backfill history, and print questions and answers as they arrive
    Watch {
        /// Skip the REST history backfill
        #[arg(long)]
        no_backfill: bool,
    },

    /// Submit one answer and wait for the hub to confirm it
    Answer {
        /// Question to answer
        question_id: String,

        /// User who asked the question
        user_id: String,

        /// Answer text
        text: String,

        /// Seconds to wait for the confirmed broadcast
        #[arg(short, long, default_value = "10")]
        timeout: u64,
    },

    /// List questions from the REST API
    Questions {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Path of the log file written by the binary
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("questionsync")
        .join("logs")
        .join("questionsync.log")
}
