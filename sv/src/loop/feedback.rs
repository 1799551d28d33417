//! Repair feedback: the bounded, readable summary handed to the repair step

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{DebugInfo, Plan, TestResult};
use crate::eval::normalize::format_chars;

/// Default number of failed cases shown to the repairer
pub const DEFAULT_MAX_FAILED_CASES: usize = 10;

pub const NO_COMPILER_ERRORS: &str = "No compiler errors.";
pub const NO_FAILED_TESTS: &str = "No failed tests.";

/// Everything the repair step needs to fix a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairFeedback {
    pub solution_plan: String,
    pub original_code: String,
    pub failed_tests_formatted: String,
    pub compiler_error: String,
}

/// Builds [`RepairFeedback`] from a failed evaluation
#[derive(Debug, Clone)]
pub struct FeedbackAssembler {
    max_failed_cases: usize,
    display_limit: usize,
}

impl Default for FeedbackAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILED_CASES)
    }
}

impl FeedbackAssembler {
    pub fn new(max_failed_cases: usize) -> Self {
        debug!(max_failed_cases, "FeedbackAssembler::new: called");
        Self {
            max_failed_cases: max_failed_cases.max(1),
            display_limit: crate::eval::normalize::DISPLAY_CHAR_LIMIT,
        }
    }

    /// Override the per-field display limit
    pub fn with_display_limit(mut self, limit: usize) -> Self {
        self.display_limit = limit;
        self
    }

    pub fn max_failed_cases(&self) -> usize {
        self.max_failed_cases
    }

    pub fn assemble(&self, plan: &Plan, info: &DebugInfo) -> RepairFeedback {
        self.assemble_with_rng(plan, info, &mut rand::rng())
    }

    /// Same as [`assemble`](Self::assemble) with a caller-supplied RNG
    pub fn assemble_with_rng<R: Rng + ?Sized>(&self, plan: &Plan, info: &DebugInfo, rng: &mut R) -> RepairFeedback {
        debug!(
            failed = info.failed_cases.len(),
            cap = self.max_failed_cases,
            error_type = ?info.error_type,
            "assemble_with_rng: called"
        );

        let selected = self.select(&info.failed_cases, rng);
        let failed_tests_formatted = if selected.is_empty() {
            NO_FAILED_TESTS.to_string()
        } else {
            selected
                .iter()
                .map(|r| self.format_case(r))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        RepairFeedback {
            solution_plan: plan.describe(),
            original_code: info.code.clone(),
            failed_tests_formatted,
            compiler_error: info
                .compile_error_message
                .clone()
                .unwrap_or_else(|| NO_COMPILER_ERRORS.to_string()),
        }
    }

    /// At most `max_failed_cases` failures, sampled without replacement, in test order
    fn select<'a, R: Rng + ?Sized>(&self, failed: &'a [TestResult], rng: &mut R) -> Vec<&'a TestResult> {
        if failed.len() <= self.max_failed_cases {
            return failed.iter().collect();
        }
        debug!(from = failed.len(), to = self.max_failed_cases, "select: sampling failures");
        let mut picked: Vec<&TestResult> = rand::seq::index::sample(rng, failed.len(), self.max_failed_cases)
            .into_iter()
            .map(|i| &failed[i])
            .collect();
        picked.sort_by_key(|r| r.test_index);
        picked
    }

    fn format_case(&self, result: &TestResult) -> String {
        let limit = self.display_limit;
        let mut text = format!(
            "Test Case {}:\nInput: {}\nExpected: {}\nGot: {}",
            result.test_index + 1,
            format_chars(&result.input, limit),
            format_chars(&result.expected, limit),
            format_chars(&result.actual, limit)
        );
        if let Some(error) = &result.error_message {
            text.push_str(&format!("\nError: {}", format_chars(error, limit)));
        }
        text
    }
}
