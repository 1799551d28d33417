//! Candidate evaluation
//!
//! - [`normalize`] - whitespace-insensitive comparison and display truncation
//! - [`executor`] - timeout-bounded execution of one entry point on one input
//! - [`runtime`] - loading candidate source into an entry point
//! - [`evaluator`] - full evaluation of a candidate against a test list

pub mod evaluator;
pub mod executor;
pub mod normalize;
pub mod runtime;

pub use evaluator::CandidateEvaluator;
pub use executor::{EntryPoint, ExecutionOutcome, run};
pub use normalize::{format_for_display, format_tokens_for_display, normalize, outputs_match};
pub use runtime::{
    CompileError, ENTRY_POINT, FnEntryPoint, NativeRuntime, OutputSink, Runtime, ScriptLanguage, ScriptRuntime,
    create_runtime,
};
