//! In-process candidates: Rust closures run on detached worker threads
//!
//! Timeouts here are best effort. A worker that never returns is abandoned,
//! not killed; its thread leaks until the closure finishes (or the process
//! exits). The evaluation loop stays live either way.

use std::collections::HashMap;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use super::{CompileError, ENTRY_POINT, Runtime};
use crate::eval::executor::EntryPoint;

/// Signature of a native candidate: read `input`, print to the sink and/or return text
pub type SolveFn = dyn Fn(&str, &mut OutputSink) -> Result<Option<String>, String> + Send + Sync;

/// Per-invocation output capture
///
/// Each invocation gets a fresh sink; nothing is shared across runs.
#[derive(Debug, Default)]
pub struct OutputSink {
    buffer: String,
}

impl OutputSink {
    /// Append text as-is
    pub fn write(&mut self, text: impl Display) {
        use std::fmt::Write;
        let _ = write!(self.buffer, "{}", text);
    }

    /// Append text followed by a newline
    pub fn line(&mut self, text: impl Display) {
        self.write(text);
        self.buffer.push('\n');
    }

    /// Captured text, then the returned value (if any) on its own line
    fn finish(mut self, returned: Option<String>) -> String {
        if let Some(value) = returned {
            if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
                self.buffer.push('\n');
            }
            self.buffer.push_str(&value);
        }
        self.buffer
    }
}

/// Entry point backed by a Rust closure
#[derive(Clone)]
pub struct FnEntryPoint {
    solve: Arc<SolveFn>,
}

impl FnEntryPoint {
    pub fn new<F>(solve: F) -> Self
    where
        F: Fn(&str, &mut OutputSink) -> Result<Option<String>, String> + Send + Sync + 'static,
    {
        Self { solve: Arc::new(solve) }
    }

    fn from_shared(solve: Arc<SolveFn>) -> Self {
        Self { solve }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[async_trait]
impl EntryPoint for FnEntryPoint {
    async fn invoke(&self, input: &str) -> Result<String, String> {
        debug!(input_len = input.len(), "FnEntryPoint::invoke: called");
        let (tx, rx) = oneshot::channel();
        let solve = Arc::clone(&self.solve);
        let input = input.to_string();

        // Detached: dropping the handle leaves the thread running on its own
        std::thread::Builder::new()
            .name("sv-candidate".to_string())
            .spawn(move || {
                let mut sink = OutputSink::default();
                let result = catch_unwind(AssertUnwindSafe(|| solve(&input, &mut sink)));
                let outcome = match result {
                    Ok(Ok(returned)) => Ok(sink.finish(returned)),
                    Ok(Err(description)) => Err(description),
                    Err(payload) => Err(panic_message(payload)),
                };
                // Receiver is gone when the caller already timed out
                let _ = tx.send(outcome);
            })
            .map_err(|e| format!("Failed to spawn candidate worker: {}", e))?;

        rx.await
            .map_err(|_| "Candidate worker exited without reporting".to_string())?
    }
}

/// Runtime whose "source" names a registered closure
///
/// Useful for embedding hand-written reference solutions and as a test double
/// for the evaluator.
#[derive(Clone, Default)]
pub struct NativeRuntime {
    registry: HashMap<String, Arc<SolveFn>>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate under `name`
    pub fn register<F>(mut self, name: impl Into<String>, solve: F) -> Self
    where
        F: Fn(&str, &mut OutputSink) -> Result<Option<String>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(%name, "NativeRuntime::register: called");
        self.registry.insert(name, Arc::new(solve));
        self
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn load(&self, source: &str) -> Result<Arc<dyn EntryPoint>, CompileError> {
        let key = source.trim();
        debug!(%key, "NativeRuntime::load: called");
        if key.is_empty() {
            return Err(CompileError::Load("empty candidate source".to_string()));
        }
        match self.registry.get(key) {
            Some(solve) => Ok(Arc::new(FnEntryPoint::from_shared(Arc::clone(solve)))),
            None => {
                debug!(%key, "NativeRuntime::load: not registered");
                Err(CompileError::MissingEntryPoint(ENTRY_POINT))
            }
        }
    }
}
