//! CandidateEvaluator - load a candidate, run it against every case, classify
//!
//! Candidate-caused failures never escape as errors: compilation problems,
//! exceptions and hangs all come back as a `TestEvaluationResult`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::executor::{self, ExecutionOutcome};
use super::normalize::{format_for_display, outputs_match};
use super::runtime::Runtime;
use crate::domain::{TIMEOUT_NOTE, TestCase, TestEvaluationResult, TestResult, evaluation_order};

/// Runs candidates against test cases under a per-case time limit
#[derive(Clone)]
pub struct CandidateEvaluator {
    runtime: Arc<dyn Runtime>,
    case_timeout: Duration,
}

impl CandidateEvaluator {
    pub fn new(runtime: Arc<dyn Runtime>, case_timeout: Duration) -> Self {
        debug!(runtime = runtime.name(), ?case_timeout, "CandidateEvaluator::new: called");
        Self { runtime, case_timeout }
    }

    pub fn case_timeout(&self) -> Duration {
        self.case_timeout
    }

    /// Evaluate `source` against `cases` (public cases run first)
    pub async fn evaluate(&self, source: &str, cases: &[TestCase]) -> TestEvaluationResult {
        debug!(source_len = source.len(), case_count = cases.len(), "evaluate: called");

        let entry = match self.runtime.load(source).await {
            Ok(entry) => entry,
            Err(e) => {
                let message = e.to_string();
                info!("Candidate failed to load: {}", message);
                return TestEvaluationResult::compile_failed(source, &message);
            }
        };

        if cases.is_empty() {
            warn!("Evaluating candidate against an empty test list");
        }

        let mut results: Vec<TestResult> = Vec::with_capacity(cases.len());
        let mut blocks: Vec<String> = Vec::with_capacity(cases.len());

        for (test_index, case) in evaluation_order(cases).into_iter().enumerate() {
            debug!(test_index, is_public = case.is_public, "evaluate: running case");
            let outcome = executor::run(entry.as_ref(), &case.input, self.case_timeout).await;

            let result = match outcome {
                ExecutionOutcome::Completed { output } => {
                    let passed = outputs_match(&case.expected_output, &output);
                    TestResult::compared(case, output, passed, test_index)
                }
                ExecutionOutcome::Failed { description } => TestResult::errored(case, description, test_index),
                ExecutionOutcome::TimedOut { limit } => {
                    warn!(test_index, ?limit, "Candidate timed out, aborting remaining cases");
                    let result = TestResult::errored(case, format!("Timed out after {:?}", limit), test_index);
                    blocks.push(format_block(&result));
                    results.push(result);
                    blocks.push(format!(
                        "\nEvaluation aborted after test case {}: {}\n",
                        test_index + 1,
                        TIMEOUT_NOTE
                    ));
                    return TestEvaluationResult::failed(
                        blocks.join("\n"),
                        source,
                        results,
                        Some(TIMEOUT_NOTE.to_string()),
                    );
                }
            };

            blocks.push(format_block(&result));
            results.push(result);
        }

        let status = blocks.join("\n");
        let passed = results.iter().filter(|r| r.passed).count();
        info!("Evaluation finished: {}/{} cases passed", passed, results.len());

        if passed == results.len() {
            TestEvaluationResult::passed(status, results)
        } else {
            TestEvaluationResult::failed(status, source, results, None)
        }
    }
}

/// Report block for one case, every field display-truncated
fn format_block(result: &TestResult) -> String {
    let mut block = format!(
        "\nTest Case {}:\nInput:\n{}\nExpected:\n{}\nGot:\n{}\nStatus: {}\n",
        result.test_index + 1,
        format_for_display(&result.input),
        format_for_display(&result.expected),
        format_for_display(&result.actual),
        if result.passed { "PASSED" } else { "FAILED" }
    );
    if let Some(error) = &result.error_message {
        block.push_str(&format!("Error:\n{}\n", format_for_display(error)));
    }
    block
}
