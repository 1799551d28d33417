//! Candidate runtimes
//!
//! A runtime turns candidate source text into an [`EntryPoint`]. Loading is
//! the "compile" phase of evaluation: any failure here, including a missing
//! `solve` function, is a compilation error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::EvaluationConfig;
use crate::eval::executor::EntryPoint;

mod native;
mod script;

pub use native::{FnEntryPoint, NativeRuntime, OutputSink, SolveFn};
pub use script::{ScriptLanguage, ScriptRuntime};

/// Name of the function every candidate must define
pub const ENTRY_POINT: &str = "solve";

/// Errors raised while loading a candidate
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("No '{0}' function found in code")]
    MissingEntryPoint(&'static str),

    #[error("{0}")]
    Load(String),

    #[error("Loading timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to prepare candidate: {0}")]
    Io(#[from] std::io::Error),
}

/// Strategy for loading candidate source into something executable
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Short name for logs and reports
    fn name(&self) -> &'static str;

    /// Load `source` and resolve its entry point
    async fn load(&self, source: &str) -> Result<Arc<dyn EntryPoint>, CompileError>;
}

/// Build the script runtime described by the evaluation config
pub fn create_runtime(config: &EvaluationConfig) -> Arc<dyn Runtime> {
    debug!(language = %config.language, interpreter = ?config.interpreter, "create_runtime: called");
    Arc::new(ScriptRuntime::new(
        config.language,
        config.interpreter.clone(),
        Duration::from_millis(config.load_timeout_ms),
    ))
}
