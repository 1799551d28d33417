//! Persisted record of a solve run

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use super::engine::SolveOutcome;

/// What `sv solve --output` writes
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub problem: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub outcome: SolveOutcome,
}

impl SolveReport {
    pub fn new(problem: impl Into<String>, started_at: DateTime<Utc>, outcome: SolveOutcome) -> Self {
        Self {
            problem: problem.into(),
            started_at,
            finished_at: Utc::now(),
            success: outcome.is_success(),
            outcome,
        }
    }

    /// Wall time between start and finish in milliseconds
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Write the report as pretty JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        debug!(?path, "SolveReport::write: called");
        let json = serde_json::to_string_pretty(self).context("Failed to serialize solve report")?;
        fs::write(path, json).context(format!("Failed to write solve report to {}", path.display()))?;
        info!("Wrote solve report to {}", path.display());
        Ok(())
    }
}
