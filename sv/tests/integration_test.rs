//! Integration tests for SolverLoop
//!
//! These run real shell candidates through the evaluator and the solve engine.

#![cfg(unix)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, eyre};
use solverloop::config::IterationConfig;
use solverloop::domain::{Plan, Problem, TIMEOUT_NOTE, TestSet};
use solverloop::eval::{CandidateEvaluator, ScriptRuntime};
use solverloop::r#loop::{AttemptBudget, CandidateSource, Decision, FeedbackAssembler, RepairFeedback, SolveEngine};

const PARITY: &str = "solve() { if [ $(( $1 % 2 )) -eq 0 ]; then echo YES; else echo NO; fi; }\n";
const ALWAYS_YES: &str = "solve() { echo YES; }\n";
const SPIN: &str = "solve() { while :; do :; done; }\n";

fn parity_problem(plans: Vec<Plan>) -> Problem {
    Problem {
        name: "parity".to_string(),
        statement: "Print YES if n is even, NO otherwise.".to_string(),
        plans,
        public_tests: TestSet {
            input: vec!["2\n".to_string(), "7\n".to_string()],
            output: vec!["YES\n".to_string(), "NO\n".to_string()],
        },
        private_tests: Some(TestSet {
            input: vec!["10".to_string(), "13".to_string()],
            output: vec!["YES".to_string(), "NO".to_string()],
        }),
    }
}

fn evaluator(case_timeout: Duration) -> CandidateEvaluator {
    CandidateEvaluator::new(Arc::new(ScriptRuntime::shell()), case_timeout)
}

/// Hands out pre-written shell candidates in order
struct QueuedSource {
    generated: Mutex<VecDeque<&'static str>>,
    repaired: Mutex<VecDeque<&'static str>>,
    feedback: Mutex<Vec<RepairFeedback>>,
}

impl QueuedSource {
    fn new(generated: &[&'static str], repaired: &[&'static str]) -> Self {
        Self {
            generated: Mutex::new(generated.iter().copied().collect()),
            repaired: Mutex::new(repaired.iter().copied().collect()),
            feedback: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CandidateSource for QueuedSource {
    async fn generate(&self, _problem: &Problem, _plan: &Plan) -> Result<String> {
        let next = self.generated.lock().unwrap().pop_front();
        next.map(str::to_string).ok_or_else(|| eyre!("out of generated candidates"))
    }

    async fn repair(&self, _problem: &Problem, feedback: &RepairFeedback) -> Result<String> {
        self.feedback.lock().unwrap().push(feedback.clone());
        let next = self.repaired.lock().unwrap().pop_front();
        next.map(str::to_string).ok_or_else(|| eyre!("out of repaired candidates"))
    }
}

// =============================================================================
// Evaluator Tests
// =============================================================================

#[tokio::test]
async fn test_shell_candidate_passes_all_cases() {
    let problem = parity_problem(vec![Plan::new("Modulo", "check n % 2", 90)]);
    let result = evaluator(Duration::from_secs(5)).evaluate(PARITY, &problem.test_cases()).await;

    assert!(result.all_tests_passed, "status: {}", result.status);
    assert_eq!(result.requires_debugging, Some(false));
    assert_eq!(result.results.len(), 4);
    assert!(result.check_consistency().is_ok());
}

#[tokio::test]
async fn test_wrong_answer_reports_failures() {
    let problem = parity_problem(vec![]);
    let result = evaluator(Duration::from_secs(5))
        .evaluate(ALWAYS_YES, &problem.test_cases())
        .await;

    assert!(!result.all_tests_passed);
    assert_eq!(result.passed_count(), 2);
    let info = result.debug_info.as_ref().unwrap();
    assert_eq!(info.failed_cases.len(), 2);
    assert!(result.status.contains("Status: FAILED"));
    assert!(result.check_consistency().is_ok());
}

#[tokio::test]
async fn test_hanging_candidate_aborts_remaining_cases() {
    let problem = parity_problem(vec![]);
    let result = evaluator(Duration::from_millis(300)).evaluate(SPIN, &problem.test_cases()).await;

    assert!(!result.all_tests_passed);
    assert_eq!(result.results.len(), 1);
    let info = result.debug_info.as_ref().unwrap();
    assert_eq!(info.compile_error_message.as_deref(), Some(TIMEOUT_NOTE));
    assert!(result.status.contains("Evaluation aborted after test case 1"));
}

#[tokio::test]
async fn test_unloadable_candidate_is_compile_failure() {
    let problem = parity_problem(vec![]);
    let result = evaluator(Duration::from_secs(5))
        .evaluate("solve() { echo unterminated\n", &problem.test_cases())
        .await;

    assert!(!result.all_tests_passed);
    assert!(result.results.is_empty());
    assert!(result.debug_info.as_ref().unwrap().compile_error_message.is_some());
}

// =============================================================================
// Solve Engine Tests
// =============================================================================

#[tokio::test]
async fn test_engine_repairs_with_real_feedback() {
    let source = Arc::new(QueuedSource::new(&[ALWAYS_YES], &[PARITY]));
    let engine = SolveEngine::new(
        source.clone(),
        evaluator(Duration::from_secs(5)),
        FeedbackAssembler::default(),
        IterationConfig {
            k_debug: 2,
            t_plan: 1,
            budget: AttemptBudget::PerPlan,
        },
    );

    let outcome = engine
        .run(&parity_problem(vec![Plan::new("Modulo", "check n % 2", 90)]))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.code(), PARITY);
    assert_eq!(outcome.attempts().len(), 2);
    assert_eq!(outcome.attempts()[0].decision, Decision::Debug { attempt: 1 });

    let feedback = source.feedback.lock().unwrap();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].original_code, ALWAYS_YES);
    assert!(feedback[0].failed_tests_formatted.contains("Expected: NO"));
    assert!(feedback[0].failed_tests_formatted.contains("Got: YES"));
    assert_eq!(feedback[0].compiler_error, "No compiler errors.");
    assert!(feedback[0].solution_plan.contains("Algorithm name: Modulo"));
}

#[tokio::test]
async fn test_engine_exhausts_after_timeouts() {
    let source = Arc::new(QueuedSource::new(&[SPIN], &[SPIN]));
    let engine = SolveEngine::new(
        source.clone(),
        evaluator(Duration::from_millis(200)),
        FeedbackAssembler::default(),
        IterationConfig {
            k_debug: 2,
            t_plan: 1,
            budget: AttemptBudget::PerPlan,
        },
    );

    let outcome = engine
        .run(&parity_problem(vec![Plan::new("Modulo", "check n % 2", 90)]))
        .await
        .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts().len(), 2);
    assert_eq!(outcome.attempts()[1].decision, Decision::Exhausted);

    let feedback = source.feedback.lock().unwrap();
    assert_eq!(feedback[0].compiler_error, TIMEOUT_NOTE);
    assert!(feedback[0].failed_tests_formatted.contains("Timed out"));
}
