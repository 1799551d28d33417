//! Solve loop: iteration control, repair feedback and the engine that drives them
//!
//! Each cycle evaluates one candidate. A failing candidate is either repaired
//! (with bounded feedback about what went wrong) or replaced by a fresh one
//! generated from the next plan, until a candidate passes or the plans run out.

mod controller;
mod engine;
mod feedback;
mod report;

pub use controller::{AttemptBudget, Decision, IterationState};
pub use engine::{AttemptKind, AttemptRecord, CandidateSource, SolveEngine, SolveOutcome};
pub use feedback::{DEFAULT_MAX_FAILED_CASES, FeedbackAssembler, NO_COMPILER_ERRORS, NO_FAILED_TESTS, RepairFeedback};
pub use report::SolveReport;
