//! Domain types for SolverLoop
//!
//! Core domain types: TestCase, TestResult, TestEvaluationResult, Problem, Plan.
//! Evaluation reports are ephemeral: rebuilt on every evaluation and consumed
//! by the iteration controller.

mod evaluation;
mod problem;
mod test_case;

pub use evaluation::{DebugInfo, ErrorType, InvariantViolation, TIMEOUT_NOTE, TestEvaluationResult};
pub use problem::{Plan, Problem, TestSet, rank_plans};
pub use test_case::{TestCase, TestResult, evaluation_order};
