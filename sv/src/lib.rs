//! SolverLoop - self-correcting plan/code/test/debug loop
//!
//! SolverLoop takes candidate programs for a competitive-programming problem,
//! runs them against the problem's tests under a per-case time limit, and
//! decides after every evaluation whether to stop, repair the candidate, or
//! start over from the next plan.
//!
//! # Modules
//!
//! - [`domain`] - Problems, plans, test cases and evaluation reports
//! - [`eval`] - Output normalization, bounded execution and candidate evaluation
//! - [`r#loop`] - Iteration control, repair feedback and the solve engine
//! - [`llm`] - LLM client trait with OpenAI and Anthropic implementations
//! - [`prompts`] - Prompt templates for planning, generation and repair
//! - [`agent`] - LLM-backed planner and candidate source
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agent;
pub mod cli;
pub mod config;
pub mod domain;
pub mod eval;
pub mod llm;
pub mod prompts;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use agent::{AgentError, CodeExtractor, LlmCandidateSource, PlanParser};
pub use config::{Config, EvaluationConfig, FeedbackConfig, IterationConfig, LlmConfig};
pub use domain::{DebugInfo, ErrorType, Plan, Problem, TestCase, TestEvaluationResult, TestResult};
pub use eval::{CandidateEvaluator, CompileError, EntryPoint, ExecutionOutcome, Runtime, ScriptLanguage, create_runtime};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use prompts::PromptLoader;
pub use r#loop::{
    AttemptBudget, CandidateSource, Decision, FeedbackAssembler, IterationState, RepairFeedback, SolveEngine,
    SolveOutcome, SolveReport,
};
