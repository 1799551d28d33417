//! TestCase and TestResult domain types

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One input/expected-output pair a candidate is judged against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Text fed to the candidate's entry point
    pub input: String,

    /// Text the candidate must produce (compared whitespace-insensitively)
    pub expected_output: String,

    /// Public cases are visible to the generation prompt; private ones are withheld
    #[serde(default)]
    pub is_public: bool,
}

impl TestCase {
    /// Create a public test case
    pub fn public(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            is_public: true,
        }
    }

    /// Create a private test case
    pub fn private(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            is_public: false,
        }
    }
}

/// Order cases for evaluation: public first, then private, stable within each group
pub fn evaluation_order(cases: &[TestCase]) -> Vec<&TestCase> {
    debug!(case_count = cases.len(), "evaluation_order: called");
    cases
        .iter()
        .filter(|c| c.is_public)
        .chain(cases.iter().filter(|c| !c.is_public))
        .collect()
}

/// Outcome of running one test case during one evaluation
///
/// Rebuilt on every evaluation; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,

    /// Position of the case in evaluation order (0-indexed)
    pub test_index: usize,

    /// Exception text or timeout note, when the candidate did not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TestResult {
    /// Result for a case whose output was compared
    pub fn compared(case: &TestCase, actual: impl Into<String>, passed: bool, test_index: usize) -> Self {
        Self {
            input: case.input.clone(),
            expected: case.expected_output.trim().to_string(),
            actual: actual.into().trim().to_string(),
            passed,
            test_index,
            error_message: None,
        }
    }

    /// Result for a case where the candidate raised or hung
    pub fn errored(case: &TestCase, error_message: impl Into<String>, test_index: usize) -> Self {
        Self {
            input: case.input.clone(),
            expected: case.expected_output.trim().to_string(),
            actual: String::new(),
            passed: false,
            test_index,
            error_message: Some(error_message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_order_public_first() {
        let cases = vec![
            TestCase::private("p1", "a"),
            TestCase::public("q1", "b"),
            TestCase::private("p2", "c"),
            TestCase::public("q2", "d"),
        ];

        let ordered: Vec<&str> = evaluation_order(&cases).iter().map(|c| c.input.as_str()).collect();
        assert_eq!(ordered, vec!["q1", "q2", "p1", "p2"]);
    }

    #[test]
    fn test_errored_result_has_empty_actual() {
        let case = TestCase::public("1 2", "3\n");
        let result = TestResult::errored(&case, "ZeroDivisionError", 4);

        assert!(!result.passed);
        assert_eq!(result.actual, "");
        assert_eq!(result.expected, "3");
        assert_eq!(result.test_index, 4);
        assert_eq!(result.error_message.as_deref(), Some("ZeroDivisionError"));
    }

    #[test]
    fn test_compared_result_trims() {
        let case = TestCase::public("x", "  YES \n");
        let result = TestResult::compared(&case, "YES\n\n", true, 0);

        assert_eq!(result.expected, "YES");
        assert_eq!(result.actual, "YES");
        assert!(result.error_message.is_none());
    }
}
