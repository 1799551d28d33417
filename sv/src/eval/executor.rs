//! Timeout-bounded execution of a candidate entry point
//!
//! The executor owns the deadline; the entry point owns isolation. When the
//! deadline passes the invocation future is dropped, and each strategy decides
//! what dropping means: process-backed entry points kill their process group,
//! thread-backed ones abandon a detached worker.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

/// The single capability every candidate exposes: text in, text out
#[async_trait]
pub trait EntryPoint: Send + Sync {
    /// Run the candidate once on `input`
    ///
    /// Returns the captured/returned output, or a description of what the
    /// candidate raised. Implementations must not share capture state between
    /// calls.
    async fn invoke(&self, input: &str) -> Result<String, String>;
}

/// Result of one bounded execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Candidate finished and produced output
    Completed { output: String },
    /// Candidate raised during execution
    Failed { description: String },
    /// Candidate did not finish within the limit
    TimedOut { limit: Duration },
}

impl ExecutionOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionOutcome::TimedOut { .. })
    }
}

/// Invoke `entry` on `input`, giving up after `timeout`
pub async fn run(entry: &dyn EntryPoint, input: &str, timeout: Duration) -> ExecutionOutcome {
    debug!(input_len = input.len(), timeout_ms = timeout.as_millis() as u64, "run: called");
    let start = Instant::now();

    let outcome = match tokio::time::timeout(timeout, entry.invoke(input)).await {
        Ok(Ok(output)) => {
            debug!(output_len = output.len(), "run: completed");
            ExecutionOutcome::Completed { output }
        }
        Ok(Err(description)) => {
            debug!(%description, "run: candidate failed");
            ExecutionOutcome::Failed { description }
        }
        Err(_) => {
            debug!("run: timed out, abandoning invocation");
            ExecutionOutcome::TimedOut { limit: timeout }
        }
    };

    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "run: done");
    outcome
}
