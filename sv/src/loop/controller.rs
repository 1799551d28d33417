//! IterationState - debug/advance/terminate decisions over evaluation results

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::domain::TestEvaluationResult;

/// How the debug allowance is counted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptBudget {
    /// Each plan gets `k_debug` attempts of its own
    #[default]
    PerPlan,
    /// `k_debug` attempts across the whole run; once spent, every failure advances
    Shared,
}

impl std::fmt::Display for AttemptBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptBudget::PerPlan => write!(f, "per-plan"),
            AttemptBudget::Shared => write!(f, "shared"),
        }
    }
}

/// What to do after an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum Decision {
    /// All tests passed
    Success,
    /// Repair the current candidate; `attempt` counts repairs on this plan
    Debug { attempt: u32 },
    /// Generate fresh code from the plan at `plan_index`
    Advance { plan_index: u32 },
    /// No plans left
    Exhausted,
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Decision::Success | Decision::Exhausted)
    }
}

/// Attempt counters for one solve run
///
/// `observe` is the only mutator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationState {
    k_tries: u32,
    k_current: u32,
    t_current: u32,
    k_debug: u32,
    t_plan: u32,
    budget: AttemptBudget,
    finished: Option<Decision>,
}

impl IterationState {
    pub fn new(k_debug: u32, t_plan: u32, budget: AttemptBudget) -> Self {
        debug!(k_debug, t_plan, %budget, "IterationState::new: called");
        Self {
            k_tries: 0,
            k_current: 0,
            t_current: 0,
            k_debug: k_debug.max(1),
            t_plan: t_plan.max(1),
            budget,
            finished: None,
        }
    }

    /// Total failed attempts observed
    pub fn k_tries(&self) -> u32 {
        self.k_tries
    }

    /// Debug attempts on the current plan
    pub fn k_current(&self) -> u32 {
        self.k_current
    }

    /// Index of the current plan
    pub fn t_current(&self) -> u32 {
        self.t_current
    }

    pub fn k_debug(&self) -> u32 {
        self.k_debug
    }

    pub fn t_plan(&self) -> u32 {
        self.t_plan
    }

    pub fn budget(&self) -> AttemptBudget {
        self.budget
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Fold one evaluation result into the counters
    pub fn observe(&mut self, result: &TestEvaluationResult) -> Decision {
        debug!(
            k_tries = self.k_tries,
            k_current = self.k_current,
            t_current = self.t_current,
            passed = result.all_tests_passed,
            "observe: called"
        );

        if let Some(decision) = self.finished {
            debug!(?decision, "observe: already finished");
            return decision;
        }

        let passed = match result.check_consistency() {
            Ok(()) => result.all_tests_passed,
            Err(violation) => {
                error!("Inconsistent evaluation result, treating as failed: {}", violation);
                false
            }
        };

        if passed {
            info!(k_tries = self.k_tries, t_current = self.t_current, "All tests passed");
            self.finished = Some(Decision::Success);
            return Decision::Success;
        }

        let spent = match self.budget {
            AttemptBudget::PerPlan => self.k_current,
            AttemptBudget::Shared => self.k_tries,
        };

        self.k_tries += 1;
        if spent + 1 < self.k_debug {
            self.k_current += 1;
            debug!(k_current = self.k_current, k_tries = self.k_tries, "observe: debugging current plan");
            return Decision::Debug {
                attempt: self.k_current,
            };
        }

        self.t_current += 1;
        self.k_current = 0;
        if self.t_current >= self.t_plan {
            info!(k_tries = self.k_tries, t_plan = self.t_plan, "All plans exhausted");
            self.finished = Some(Decision::Exhausted);
            return Decision::Exhausted;
        }

        info!(plan_index = self.t_current, k_tries = self.k_tries, "Advancing to next plan");
        Decision::Advance {
            plan_index: self.t_current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TestResult;

    fn pass() -> TestEvaluationResult {
        TestEvaluationResult::passed(String::new(), Vec::new())
    }

    fn fail() -> TestEvaluationResult {
        let result = TestResult {
            input: "1".to_string(),
            expected: "2".to_string(),
            actual: "3".to_string(),
            passed: false,
            test_index: 0,
            error_message: None,
        };
        TestEvaluationResult::failed(String::new(), "code", vec![result], None)
    }

    fn counters(state: &IterationState) -> (u32, u32, u32) {
        (state.k_tries(), state.k_current(), state.t_current())
    }

    #[test]
    fn test_success_on_first_attempt() {
        let mut state = IterationState::new(3, 3, AttemptBudget::PerPlan);
        assert_eq!(state.observe(&pass()), Decision::Success);
        assert_eq!(counters(&state), (0, 0, 0));
        assert!(state.is_finished());
    }

    #[test]
    fn test_per_plan_debugs_then_advances() {
        let mut state = IterationState::new(3, 2, AttemptBudget::PerPlan);

        assert_eq!(state.observe(&fail()), Decision::Debug { attempt: 1 });
        assert_eq!(state.observe(&fail()), Decision::Debug { attempt: 2 });
        assert_eq!(state.observe(&fail()), Decision::Advance { plan_index: 1 });
        assert_eq!(counters(&state), (3, 0, 1));

        assert_eq!(state.observe(&fail()), Decision::Debug { attempt: 1 });
        assert_eq!(state.observe(&fail()), Decision::Debug { attempt: 2 });
        assert_eq!(state.observe(&fail()), Decision::Exhausted);
        assert_eq!(counters(&state), (6, 0, 2));
    }

    #[test]
    fn test_shared_budget_scenario() {
        let mut state = IterationState::new(3, 2, AttemptBudget::Shared);

        assert_eq!(state.observe(&fail()), Decision::Debug { attempt: 1 });
        assert_eq!(state.observe(&fail()), Decision::Debug { attempt: 2 });
        assert_eq!(state.observe(&fail()), Decision::Advance { plan_index: 1 });
        assert_eq!(counters(&state), (3, 0, 1));

        assert_eq!(state.observe(&fail()), Decision::Exhausted);
        assert_eq!(counters(&state), (4, 0, 2));
    }

    #[test]
    fn test_success_after_repairs_skips_remaining_plans() {
        let mut state = IterationState::new(3, 5, AttemptBudget::PerPlan);
        state.observe(&fail());
        assert_eq!(state.observe(&pass()), Decision::Success);
        assert_eq!(state.t_current(), 0);
    }

    #[test]
    fn test_terminal_decision_is_sticky() {
        let mut state = IterationState::new(1, 1, AttemptBudget::PerPlan);
        assert_eq!(state.observe(&fail()), Decision::Exhausted);
        let before = state.clone();

        assert_eq!(state.observe(&pass()), Decision::Exhausted);
        assert_eq!(state, before);
    }

    #[test]
    fn test_zero_ceilings_are_raised() {
        let mut state = IterationState::new(0, 0, AttemptBudget::PerPlan);
        assert_eq!(state.k_debug(), 1);
        assert_eq!(state.t_plan(), 1);
        assert_eq!(state.observe(&fail()), Decision::Exhausted);
    }

    #[test]
    fn test_k_debug_one_advances_every_failure() {
        let mut state = IterationState::new(1, 3, AttemptBudget::PerPlan);
        assert_eq!(state.observe(&fail()), Decision::Advance { plan_index: 1 });
        assert_eq!(state.observe(&fail()), Decision::Advance { plan_index: 2 });
        assert_eq!(state.observe(&fail()), Decision::Exhausted);
    }

    #[test]
    fn test_inconsistent_result_requires_debugging() {
        let mut state = IterationState::new(3, 2, AttemptBudget::PerPlan);
        let mut malformed = fail();
        malformed.requires_debugging = None;

        assert_eq!(state.observe(&malformed), Decision::Debug { attempt: 1 });

        let mut claims_success = pass();
        claims_success.debug_info = fail().debug_info;
        assert_eq!(state.observe(&claims_success), Decision::Debug { attempt: 2 });
    }

    #[test]
    fn test_counters_stay_within_bounds() {
        for budget in [AttemptBudget::PerPlan, AttemptBudget::Shared] {
            let mut state = IterationState::new(4, 3, budget);
            let mut last_tries = 0;
            let mut last_plan = 0;
            while !state.is_finished() {
                state.observe(&fail());
                assert!(state.k_tries() > last_tries);
                assert!(state.t_current() >= last_plan);
                assert!(state.k_current() <= state.k_debug());
                assert!(state.t_current() <= state.t_plan());
                last_tries = state.k_tries();
                last_plan = state.t_current();
            }
        }
    }

    #[test]
    fn test_budget_serde() {
        let budget: AttemptBudget = serde_yaml::from_str("shared").unwrap();
        assert_eq!(budget, AttemptBudget::Shared);
        assert_eq!(serde_yaml::to_string(&AttemptBudget::PerPlan).unwrap().trim(), "per-plan");
    }
}
