//! SolverLoop - plan/code/test/debug loop for programming problems
//!
//! CLI entry point for evaluating candidates and running the solve loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use solverloop::agent::LlmCandidateSource;
use solverloop::cli::{Cli, Command, OutputFormat};
use solverloop::config::Config;
use solverloop::domain::{Problem, TestEvaluationResult};
use solverloop::eval::{CandidateEvaluator, ScriptLanguage, create_runtime};
use solverloop::llm::create_client;
use solverloop::prompts::PromptLoader;
use solverloop::r#loop::{AttemptBudget, FeedbackAssembler, SolveEngine, SolveReport};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("solverloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
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

    let log_file = fs::File::create(log_dir.join("solverloop.log")).context("Failed to create log file")?;

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

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "SolverLoop loaded config: provider={} language={}",
        config.llm.provider, config.evaluation.language
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Eval {
            candidate,
            tests,
            language,
            timeout_ms,
            format,
        } => {
            debug!(?candidate, ?tests, ?language, ?timeout_ms, ?format, "main: matched Eval command");
            cmd_eval(&config, &candidate, &tests, language, timeout_ms, format).await
        }
        Command::Solve {
            problem,
            k_debug,
            t_plan,
            budget,
            output,
        } => {
            debug!(?problem, ?k_debug, ?t_plan, ?budget, ?output, "main: matched Solve command");
            cmd_solve(&config, &problem, k_debug, t_plan, budget, output.as_deref()).await
        }
        Command::Config => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
    }
}

/// Evaluate a candidate file against a problem's tests
async fn cmd_eval(
    config: &Config,
    candidate: &Path,
    tests: &Path,
    language: Option<ScriptLanguage>,
    timeout_ms: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    debug!(?candidate, ?tests, "cmd_eval: called");
    let source = fs::read_to_string(candidate).context(format!("Failed to read candidate {}", candidate.display()))?;
    let problem = Problem::load(tests)?;

    let mut evaluation = config.evaluation.clone();
    if let Some(language) = language
        && language != evaluation.language
    {
        debug!(%language, "cmd_eval: language override, dropping configured interpreter");
        evaluation.language = language;
        evaluation.interpreter = None;
    }
    if let Some(ms) = timeout_ms {
        debug!(ms, "cmd_eval: timeout override");
        evaluation.case_timeout_ms = ms.max(1);
    }

    let evaluator = CandidateEvaluator::new(create_runtime(&evaluation), evaluation.case_timeout());
    let cases = problem.test_cases();
    let result = evaluator.evaluate(&source, &cases).await;

    match format {
        OutputFormat::Json => {
            debug!("cmd_eval: format is Json");
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            debug!("cmd_eval: format is Text");
            print_evaluation(&result, cases.len());
        }
    }

    if !result.all_tests_passed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_evaluation(result: &TestEvaluationResult, total: usize) {
    println!("{}", result.status.trim_end());
    println!();
    let passed = result.passed_count();
    if result.all_tests_passed {
        println!("{} {}/{} tests passed", "PASSED".green().bold(), passed, total);
    } else if result.results.is_empty() {
        println!("{} candidate did not load", "FAILED".red().bold());
    } else {
        println!("{} {}/{} tests passed", "FAILED".red().bold(), passed, total);
    }
}

/// Run the generate/evaluate/repair loop with the configured LLM
async fn cmd_solve(
    config: &Config,
    problem_path: &Path,
    k_debug: Option<u32>,
    t_plan: Option<u32>,
    budget: Option<AttemptBudget>,
    output: Option<&Path>,
) -> Result<()> {
    debug!(?problem_path, "cmd_solve: called");
    let problem = Problem::load(problem_path)?;

    let mut iteration = config.iteration.clone();
    if let Some(k) = k_debug {
        iteration.k_debug = k;
    }
    if let Some(t) = t_plan {
        iteration.t_plan = t;
    }
    if let Some(b) = budget {
        iteration.budget = b;
    }

    // Fail early on a missing key rather than after the first prompt renders
    config.llm.get_api_key()?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let prompts = PromptLoader::new(config.prompts.dir.clone());
    let source = LlmCandidateSource::new(llm, prompts, config.evaluation.language, config.llm.max_tokens)?
        .with_plan_count(iteration.t_plan);

    let evaluator = CandidateEvaluator::new(create_runtime(&config.evaluation), config.evaluation.case_timeout());
    let feedback =
        FeedbackAssembler::new(config.feedback.max_failed_cases).with_display_limit(config.feedback.display_limit);
    let engine = SolveEngine::new(Arc::new(source), evaluator, feedback, iteration.clone());

    println!(
        "Solving {} (k-debug={}, t-plan={}, budget={})",
        problem.name, iteration.k_debug, iteration.t_plan, iteration.budget
    );

    let started_at = Utc::now();
    let outcome = engine.run(&problem).await?;
    let success = outcome.is_success();

    println!();
    println!("{}", outcome.code());
    println!();
    let passed = outcome.result().passed_count();
    let attempts = outcome.attempts().len();
    if success {
        println!("{} after {} attempt(s)", "SOLVED".green().bold(), attempts);
    } else {
        println!(
            "{} after {} attempt(s), last candidate passed {} case(s)",
            "EXHAUSTED".red().bold(),
            attempts,
            passed
        );
    }

    if let Some(path) = output {
        SolveReport::new(&problem.name, started_at, outcome).write(path)?;
    }

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let effective = Config {
        llm: config.llm.with_provider_defaults(),
        ..config.clone()
    };
    print!("{}", serde_yaml::to_string(&effective).context("Failed to serialize config")?);
    Ok(())
}
