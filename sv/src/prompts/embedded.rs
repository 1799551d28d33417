//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System prompt for drafting scored plans
pub const PLANNING: &str = include_str!("../../prompts/planning.pmt");

/// User message carrying problem and example tests for planning
pub const PLANNING_REQUEST: &str = include_str!("../../prompts/planning-request.pmt");

/// System prompt for generating a candidate from a plan
pub const CODING: &str = include_str!("../../prompts/coding.pmt");

/// User message carrying problem, plan and example tests
pub const CODING_REQUEST: &str = include_str!("../../prompts/coding-request.pmt");

/// System prompt for repairing a failed candidate
pub const DEBUGGING: &str = include_str!("../../prompts/debugging.pmt");

/// User message carrying the repair feedback
pub const DEBUGGING_REQUEST: &str = include_str!("../../prompts/debugging-request.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "planning" => Some(PLANNING),
        "planning-request" => Some(PLANNING_REQUEST),
        "coding" => Some(CODING),
        "coding-request" => Some(CODING_REQUEST),
        "debugging" => Some(DEBUGGING),
        "debugging-request" => Some(DEBUGGING_REQUEST),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
