//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use crate::eval::ScriptLanguage;
use crate::r#loop::AttemptBudget;

/// SolverLoop - self-correcting plan/code/test/debug loop
#[derive(Parser)]
#[command(
    name = "sv",
    about = "Evaluate and iteratively repair candidate solutions to programming problems",
    version = env!("GIT_DESCRIBE"),
    after_help = after_help()
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
    /// Evaluate a candidate file against a problem's tests
    Eval {
        /// Candidate source file
        candidate: PathBuf,

        /// Problem file (YAML or JSON) providing the tests
        #[arg(short, long, value_name = "PROBLEM_FILE")]
        tests: PathBuf,

        /// Candidate language (defaults to the configured one)
        #[arg(long)]
        language: Option<ScriptLanguage>,

        /// Per-case time limit in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate, test and repair a solution with the configured LLM
    Solve {
        /// Problem file (YAML or JSON)
        problem: PathBuf,

        /// Debug attempts allowed
        #[arg(short = 'k', long)]
        k_debug: Option<u32>,

        /// Plans to try at most, and to draft when the problem lists none
        #[arg(short = 't', long)]
        t_plan: Option<u32>,

        /// How debug attempts are counted
        #[arg(short, long)]
        budget: Option<AttemptBudget>,

        /// Write a JSON report of the run
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("solverloop")
        .join("logs")
        .join("solverloop.log");
    debug!(?path, "get_log_path: returning path");
    path
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}
