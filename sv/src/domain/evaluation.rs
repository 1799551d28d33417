//! Evaluation report types
//!
//! A `TestEvaluationResult` is produced once per evaluation call, consumed by
//! the iteration controller, and then discarded.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::TestResult;

/// Note attached to runtime debug info when a case hangs
pub const TIMEOUT_NOTE: &str = "timeout, likely infinite loop";

/// Which phase of evaluation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// Candidate did not load, or has no entry point
    Compilation,
    /// Candidate loaded but at least one case failed
    Runtime,
}

/// Evidence handed to the repair cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    /// Candidate source that was evaluated
    pub code: String,

    pub error_type: ErrorType,

    /// Loader error for compilation failures; timeout note for hung runtime runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_error_message: Option<String>,

    /// Every failing case, in evaluation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_cases: Vec<TestResult>,
}

impl DebugInfo {
    pub fn compilation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error_type: ErrorType::Compilation,
            compile_error_message: Some(message.into()),
            failed_cases: Vec::new(),
        }
    }

    pub fn runtime(code: impl Into<String>, failed_cases: Vec<TestResult>, note: Option<String>) -> Self {
        Self {
            code: code.into(),
            error_type: ErrorType::Runtime,
            compile_error_message: note,
            failed_cases,
        }
    }

    /// Check the per-variant invariants
    pub fn check_consistency(&self) -> Result<(), InvariantViolation> {
        match self.error_type {
            ErrorType::Compilation if self.compile_error_message.is_none() => {
                Err(InvariantViolation::MissingCompileMessage)
            }
            ErrorType::Compilation if !self.failed_cases.is_empty() => Err(InvariantViolation::CasesOnCompilation {
                count: self.failed_cases.len(),
            }),
            ErrorType::Runtime if self.failed_cases.is_empty() => Err(InvariantViolation::RuntimeWithoutFailures),
            _ => Ok(()),
        }
    }
}

/// Internal consistency failure in an evaluation report
///
/// These indicate a bug in the evaluator, never a fault of the candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("all tests failed to pass but requires_debugging is {0:?}")]
    FailureWithoutDebugFlag(Option<bool>),

    #[error("all tests passed but the report still carries debug info")]
    SuccessWithDebugInfo,

    #[error("all tests passed but requires_debugging is set")]
    SuccessFlaggedForDebugging,

    #[error("compilation debug info without a compile error message")]
    MissingCompileMessage,

    #[error("compilation debug info lists {count} failed cases")]
    CasesOnCompilation { count: usize },

    #[error("runtime debug info lists no failed cases")]
    RuntimeWithoutFailures,
}

/// Structured report of one evaluation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEvaluationResult {
    /// Human-readable per-case report (or the compilation error)
    pub status: String,

    pub all_tests_passed: bool,

    #[serde(default)]
    pub requires_debugging: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,

    /// Every result produced, in evaluation order
    #[serde(default)]
    pub results: Vec<TestResult>,
}

impl TestEvaluationResult {
    /// Report for a run where every case passed
    pub fn passed(status: String, results: Vec<TestResult>) -> Self {
        Self {
            status,
            all_tests_passed: true,
            requires_debugging: Some(false),
            debug_info: None,
            results,
        }
    }

    /// Report for a candidate that failed to load
    pub fn compile_failed(code: &str, message: &str) -> Self {
        Self {
            status: format!("Compilation Error: {}", message),
            all_tests_passed: false,
            requires_debugging: Some(true),
            debug_info: Some(DebugInfo::compilation(code, message)),
            results: Vec::new(),
        }
    }

    /// Report for a run with at least one failing case
    pub fn failed(status: String, code: &str, results: Vec<TestResult>, note: Option<String>) -> Self {
        let failed_cases = results.iter().filter(|r| !r.passed).cloned().collect();
        Self {
            status,
            all_tests_passed: false,
            requires_debugging: Some(true),
            debug_info: Some(DebugInfo::runtime(code, failed_cases, note)),
            results,
        }
    }

    /// Number of results that passed
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Verify the flag/payload invariants of this report
    pub fn check_consistency(&self) -> Result<(), InvariantViolation> {
        debug!(all_tests_passed = self.all_tests_passed, requires_debugging = ?self.requires_debugging, "check_consistency: called");
        if self.all_tests_passed {
            if self.debug_info.is_some() {
                return Err(InvariantViolation::SuccessWithDebugInfo);
            }
            if self.requires_debugging == Some(true) {
                return Err(InvariantViolation::SuccessFlaggedForDebugging);
            }
            return Ok(());
        }

        if self.requires_debugging != Some(true) {
            return Err(InvariantViolation::FailureWithoutDebugFlag(self.requires_debugging));
        }
        match &self.debug_info {
            Some(info) => info.check_consistency(),
            None => Ok(()),
        }
    }
}
