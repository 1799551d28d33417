//! SolveEngine - generate, evaluate, repair or advance, until success or exhaustion

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::IterationConfig;
use crate::domain::{DebugInfo, Plan, Problem, TestEvaluationResult, rank_plans};
use crate::eval::CandidateEvaluator;

use super::controller::{Decision, IterationState};
use super::feedback::{FeedbackAssembler, RepairFeedback};

/// Produces candidate source code
///
/// Errors here are collaborator failures (transport, unparsable replies) and
/// end the run; candidate faults are never reported through this trait.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Fresh candidate implementing `plan`
    async fn generate(&self, problem: &Problem, plan: &Plan) -> Result<String>;

    /// Repaired candidate given the evidence from the last evaluation
    async fn repair(&self, problem: &Problem, feedback: &RepairFeedback) -> Result<String>;

    /// Draft scored plans for a problem that arrived without any
    async fn plan(&self, problem: &Problem) -> Result<Vec<Plan>> {
        Err(eyre!("Problem '{}' has no plans to try", problem.name))
    }
}

/// How a candidate came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptKind {
    Generate,
    Repair,
}

/// One evaluated candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub plan_index: usize,
    pub algorithm: String,
    pub kind: AttemptKind,
    pub passed: usize,
    pub total: usize,
    pub decision: Decision,
}

/// Final result of a solve run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum SolveOutcome {
    Success {
        final_code: String,
        result: TestEvaluationResult,
        attempts: Vec<AttemptRecord>,
        state: IterationState,
    },
    Exhausted {
        last_code: String,
        last_result: TestEvaluationResult,
        attempts: Vec<AttemptRecord>,
        state: IterationState,
    },
}

impl SolveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveOutcome::Success { .. })
    }

    /// Final code on success, last attempted code otherwise
    pub fn code(&self) -> &str {
        match self {
            SolveOutcome::Success { final_code, .. } => final_code,
            SolveOutcome::Exhausted { last_code, .. } => last_code,
        }
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            SolveOutcome::Success { attempts, .. } | SolveOutcome::Exhausted { attempts, .. } => attempts,
        }
    }

    pub fn result(&self) -> &TestEvaluationResult {
        match self {
            SolveOutcome::Success { result, .. } => result,
            SolveOutcome::Exhausted { last_result, .. } => last_result,
        }
    }
}

/// Drives the generate/evaluate/repair cycle for one problem
pub struct SolveEngine {
    source: Arc<dyn CandidateSource>,
    evaluator: CandidateEvaluator,
    feedback: FeedbackAssembler,
    iteration: IterationConfig,
}

impl SolveEngine {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        evaluator: CandidateEvaluator,
        feedback: FeedbackAssembler,
        iteration: IterationConfig,
    ) -> Self {
        debug!(
            k_debug = iteration.k_debug,
            t_plan = iteration.t_plan,
            budget = %iteration.budget,
            "SolveEngine::new: called"
        );
        Self {
            source,
            evaluator,
            feedback,
            iteration,
        }
    }

    /// Run until a candidate passes every case or the plans run out
    pub async fn run(&self, problem: &Problem) -> Result<SolveOutcome> {
        debug!(problem = %problem.name, "run: called");

        let plans = self.plans_for(problem).await?;
        let cases = problem.test_cases();
        if cases.is_empty() {
            warn!("Problem '{}' has no usable test cases", problem.name);
        }

        let t_plan = self.iteration.t_plan.min(plans.len() as u32);
        let mut state = IterationState::new(self.iteration.k_debug, t_plan, self.iteration.budget);
        info!(
            "Solving '{}' with {} plan(s), k_debug={}, budget={}",
            problem.name,
            state.t_plan(),
            state.k_debug(),
            state.budget()
        );

        let mut attempts = Vec::new();
        let mut plan_index = 0usize;
        let mut kind = AttemptKind::Generate;
        let mut code = self.generate(problem, &plans[plan_index]).await?;

        loop {
            let result = self.evaluator.evaluate(&code, &cases).await;
            let decision = state.observe(&result);
            debug!(plan_index, ?kind, ?decision, "run: attempt evaluated");
            attempts.push(AttemptRecord {
                plan_index,
                algorithm: plans[plan_index].algorithm_name.clone(),
                kind,
                passed: result.passed_count(),
                total: cases.len(),
                decision,
            });

            match decision {
                Decision::Success => {
                    info!("Problem '{}' solved after {} attempt(s)", problem.name, attempts.len());
                    return Ok(SolveOutcome::Success {
                        final_code: code,
                        result,
                        attempts,
                        state,
                    });
                }
                Decision::Exhausted => {
                    info!("Problem '{}' unsolved after {} attempt(s)", problem.name, attempts.len());
                    return Ok(SolveOutcome::Exhausted {
                        last_code: code,
                        last_result: result,
                        attempts,
                        state,
                    });
                }
                Decision::Debug { attempt } => {
                    info!("Repairing candidate for plan {} (attempt {})", plan_index + 1, attempt);
                    let info = debug_info_for(&code, &result);
                    let feedback = self.feedback.assemble(&plans[plan_index], &info);
                    code = self
                        .source
                        .repair(problem, &feedback)
                        .await
                        .context("Candidate repair failed")?;
                    kind = AttemptKind::Repair;
                }
                Decision::Advance { plan_index: next } => {
                    plan_index = next as usize;
                    info!(
                        "Advancing to plan {}: {}",
                        plan_index + 1,
                        plans[plan_index].algorithm_name
                    );
                    code = self.generate(problem, &plans[plan_index]).await?;
                    kind = AttemptKind::Generate;
                }
            }
        }
    }

    /// The problem's own plans, or freshly drafted ones when it has none
    async fn plans_for(&self, problem: &Problem) -> Result<Vec<Plan>> {
        debug!(problem = %problem.name, plan_count = problem.plans.len(), "plans_for: called");
        if !problem.plans.is_empty() {
            return Ok(problem.ranked_plans());
        }

        info!("Problem '{}' has no plans, drafting some", problem.name);
        let plans = rank_plans(self.source.plan(problem).await.context("Planning failed")?);
        if plans.is_empty() {
            return Err(eyre!("Problem '{}' has no plans to try", problem.name));
        }
        for (i, plan) in plans.iter().enumerate() {
            info!("Plan {}: {} (confidence {})", i + 1, plan.algorithm_name, plan.confidence);
        }
        Ok(plans)
    }

    async fn generate(&self, problem: &Problem, plan: &Plan) -> Result<String> {
        debug!(algorithm = %plan.algorithm_name, "generate: called");
        self.source
            .generate(problem, plan)
            .await
            .context(format!("Candidate generation failed for plan '{}'", plan.algorithm_name))
    }
}

/// Debug info for a failed result, rebuilt from the results when it is missing
fn debug_info_for(code: &str, result: &TestEvaluationResult) -> DebugInfo {
    match &result.debug_info {
        Some(info) => info.clone(),
        None => {
            debug!("debug_info_for: result carries no debug info, rebuilding");
            let failed = result.results.iter().filter(|r| !r.passed).cloned().collect();
            DebugInfo::runtime(code, failed, None)
        }
    }
}
