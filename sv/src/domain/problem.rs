//! Problem and Plan domain types
//!
//! A problem file bundles the statement, the candidate plans and the
//! public/private tests. Plans may be left out; the solve loop then asks its
//! candidate source to draft them.

use std::fs;
use std::path::Path;

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::TestCase;

/// An algorithmic approach a candidate is expected to implement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Plan {
    pub algorithm_name: String,
    pub plan: String,

    /// How likely the plan solves the problem (0-100)
    #[serde(default)]
    pub confidence: u8,
}

impl Plan {
    pub fn new(algorithm_name: impl Into<String>, plan: impl Into<String>, confidence: u8) -> Self {
        Self {
            algorithm_name: algorithm_name.into(),
            plan: plan.into(),
            confidence: confidence.min(100),
        }
    }

    /// Text form used by the generation and repair prompts
    pub fn describe(&self) -> String {
        format!("Algorithm name: {}\nPlan: {}", self.algorithm_name, self.plan)
    }
}

/// Parallel input/output arrays, as test sets are usually distributed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSet {
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default)]
    pub output: Vec<String>,
}

impl TestSet {
    fn to_cases(&self, is_public: bool) -> Vec<TestCase> {
        if self.input.len() != self.output.len() {
            warn!(
                inputs = self.input.len(),
                outputs = self.output.len(),
                is_public,
                "Test set has mismatched input/output counts, extra entries dropped"
            );
        }
        self.input
            .iter()
            .zip(self.output.iter())
            .map(|(input, output)| TestCase {
                input: input.clone(),
                expected_output: output.clone(),
                is_public,
            })
            .collect()
    }
}

/// A competitive programming problem ready for the solve loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Problem {
    #[serde(default)]
    pub name: String,

    pub statement: String,

    #[serde(default)]
    pub plans: Vec<Plan>,

    #[serde(default)]
    pub public_tests: TestSet,

    #[serde(default)]
    pub private_tests: Option<TestSet>,
}

impl Problem {
    /// Load a problem from a YAML or JSON file (chosen by extension)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(?path, "Problem::load: called");
        let content = fs::read_to_string(path).context(format!("Failed to read problem file {}", path.display()))?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let problem: Self = if is_json {
            debug!("Problem::load: parsing as JSON");
            serde_json::from_str(&content).context("Failed to parse problem JSON")?
        } else {
            debug!("Problem::load: parsing as YAML");
            serde_yaml::from_str(&content).context("Failed to parse problem YAML")?
        };

        problem.validate()?;
        info!(
            "Loaded problem '{}' from {} ({} plans)",
            problem.name,
            path.display(),
            problem.plans.len()
        );
        Ok(problem)
    }

    /// A problem is unusable without public tests
    pub fn validate(&self) -> Result<()> {
        if self.public_tests.input.is_empty() || self.public_tests.output.is_empty() {
            return Err(eyre!("No public test cases found"));
        }
        Ok(())
    }

    /// Public cases followed by private cases
    pub fn test_cases(&self) -> Vec<TestCase> {
        let mut cases = self.public_tests.to_cases(true);
        if let Some(private) = &self.private_tests {
            cases.extend(private.to_cases(false));
        }
        debug!(case_count = cases.len(), "Problem::test_cases: built");
        cases
    }

    /// Public cases only
    pub fn public_cases(&self) -> Vec<TestCase> {
        self.public_tests.to_cases(true)
    }

    /// Plans in descending confidence order; ties keep file order
    pub fn ranked_plans(&self) -> Vec<Plan> {
        rank_plans(self.plans.clone())
    }
}

/// Sort by descending confidence, stable for ties
pub fn rank_plans(mut plans: Vec<Plan>) -> Vec<Plan> {
    plans.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    plans
}
