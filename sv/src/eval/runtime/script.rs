//! Script candidates run as one subprocess per case
//!
//! Each loaded candidate lives in its own temporary directory. Every
//! invocation spawns a fresh interpreter in a new process group, feeds the
//! case input on stdin (and as the `solve` argument), and collects stdout.
//! When an invocation is dropped, on timeout or otherwise, the whole process
//! group is killed.

use std::fmt;
use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{CompileError, ENTRY_POINT, Runtime};
use crate::eval::executor::EntryPoint;

/// Exit code the loaders use to report a missing entry point
const MISSING_ENTRY_EXIT: i32 = 3;

/// Longest failure description kept from stderr (the tail is kept)
const MAX_FAILURE_CHARS: usize = 4000;

/// Loader/runner for Python candidates
///
/// In run mode the case input is installed as `sys.stdin` and stdout is
/// captured before the module loads, so writers bound at module level
/// (`input = sys.stdin.readline`, `write = sys.stdout.write`) see the case.
/// Output produced while loading is discarded. `__name__` is not
/// `"__main__"`, so guarded demo code does not run.
const PYTHON_HARNESS: &str = r#"import io
import sys
import traceback

ENTRY = "solve"
MISSING_ENTRY_EXIT = 3


def text_stream(raw=b""):
    return io.TextIOWrapper(io.BytesIO(raw), encoding="utf-8", write_through=True)


def load(path):
    with open(path, encoding="utf-8") as fh:
        source = fh.read()
    namespace = {"__name__": "candidate"}
    try:
        exec(compile(source, path, "exec"), namespace)
    except BaseException as exc:
        sys.stderr.write(f"{type(exc).__name__}: {exc}\n")
        sys.exit(1)
    entry = namespace.get(ENTRY)
    if not callable(entry):
        sys.exit(MISSING_ENTRY_EXIT)
    return entry


def main():
    mode, path = sys.argv[1], sys.argv[2]
    real_stdout = sys.stdout
    raw = b"" if mode == "check" else sys.stdin.buffer.read()
    sys.stdin = text_stream(raw)
    out = text_stream()
    sys.stdout = out
    solve = load(path)
    if mode == "check":
        return

    out.flush()
    out.buffer.seek(0)
    out.buffer.truncate()
    try:
        result = solve(raw.decode("utf-8", errors="replace"))
    except SystemExit as exc:
        if exc.code not in (None, 0):
            sys.stderr.write(f"SystemExit: {exc.code}\n")
            sys.exit(1)
        result = None
    except Exception:
        traceback.print_exc()
        sys.exit(1)
    if result is not None:
        print(result)

    out.flush()
    real_stdout.flush()
    real_stdout.buffer.write(out.buffer.getvalue())
    real_stdout.flush()


main()
"#;

/// Source the candidate quietly, then require a `solve` function
const SHELL_CHECK: &str = r#". "./$1" >/dev/null || exit 1
command -v solve >/dev/null 2>&1 || exit 3"#;

/// Source the candidate quietly, then call `solve` with the whole input
const SHELL_RUN: &str = r#". "./$1" >/dev/null
input=$(cat)
solve "$input""#;

/// Languages the script runtime can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Python,
    Shell,
}

impl ScriptLanguage {
    /// Interpreter used when none is configured
    pub fn default_interpreter(&self) -> &'static str {
        match self {
            ScriptLanguage::Python => "python3",
            ScriptLanguage::Shell => "sh",
        }
    }

    fn candidate_file(&self) -> &'static str {
        match self {
            ScriptLanguage::Python => "candidate.py",
            ScriptLanguage::Shell => "candidate.sh",
        }
    }

    /// Name used in prompts and reports
    pub fn name(&self) -> &'static str {
        match self {
            ScriptLanguage::Python => "python",
            ScriptLanguage::Shell => "shell",
        }
    }
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Check,
    Run,
}

/// Build the interpreter command for a candidate directory
fn command_for(language: ScriptLanguage, interpreter: &str, dir: &Path, mode: Mode) -> Command {
    let candidate = language.candidate_file();
    let mut command = Command::new(interpreter);
    command.current_dir(dir);
    match language {
        ScriptLanguage::Python => {
            let mode = if mode == Mode::Check { "check" } else { "run" };
            command.arg("harness.py").arg(mode).arg(candidate);
        }
        ScriptLanguage::Shell => {
            let script = if mode == Mode::Check { SHELL_CHECK } else { SHELL_RUN };
            command.arg("-c").arg(script).arg("sv-candidate").arg(candidate);
        }
    }
    command
}

/// Kills a child's whole process group when dropped while armed
///
/// Created right after spawn and disarmed once the leader has been reaped,
/// after which its pgid may be reused. Errors and the caller dropping the
/// future on timeout leave it armed.
struct ProcessGroupGuard {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            debug!(pgid, "ProcessGroupGuard::drop: killing process group");
            let _ = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL);
        }
    }
}

/// Spawn `command`, feed `input` on stdin, and collect its output
async fn spawn_and_collect(mut command: Command, input: &str) -> std::io::Result<Output> {
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn()?;
    let mut guard = ProcessGroupGuard { pgid: child.id() };
    debug!(pid = ?child.id(), "spawn_and_collect: spawned");

    if let Some(mut stdin) = child.stdin.take() {
        let input = input.as_bytes().to_vec();
        // Separate task so a candidate that never reads stdin cannot stall us
        tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
        });
    }

    let output = child.wait_with_output().await?;
    guard.disarm();
    debug!(status = ?output.status, "spawn_and_collect: child reaped, guard disarmed");
    Ok(output)
}

/// Turn a non-zero exit into a failure description
fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        let count = stderr.chars().count();
        if count > MAX_FAILURE_CHARS {
            let tail: String = stderr.chars().skip(count - MAX_FAILURE_CHARS).collect();
            return format!("...{}", tail);
        }
        return stderr.to_string();
    }
    match output.status.code() {
        Some(code) => format!("Exited with status {}", code),
        None => "Terminated by signal".to_string(),
    }
}

/// Runtime for interpreted script candidates
#[derive(Debug, Clone)]
pub struct ScriptRuntime {
    language: ScriptLanguage,
    interpreter: String,
    load_timeout: Duration,
}

impl ScriptRuntime {
    pub fn new(language: ScriptLanguage, interpreter: Option<String>, load_timeout: Duration) -> Self {
        let interpreter = interpreter.unwrap_or_else(|| language.default_interpreter().to_string());
        debug!(%language, %interpreter, ?load_timeout, "ScriptRuntime::new: called");
        Self {
            language,
            interpreter,
            load_timeout,
        }
    }

    pub fn python() -> Self {
        Self::new(ScriptLanguage::Python, None, Duration::from_secs(10))
    }

    pub fn shell() -> Self {
        Self::new(ScriptLanguage::Shell, None, Duration::from_secs(10))
    }

    pub fn language(&self) -> ScriptLanguage {
        self.language
    }
}

#[async_trait]
impl Runtime for ScriptRuntime {
    fn name(&self) -> &'static str {
        self.language.name()
    }

    async fn load(&self, source: &str) -> Result<Arc<dyn EntryPoint>, CompileError> {
        debug!(language = %self.language, source_len = source.len(), "ScriptRuntime::load: called");
        if source.trim().is_empty() {
            return Err(CompileError::Load("empty candidate source".to_string()));
        }

        let dir = tempfile::Builder::new().prefix("sv-candidate-").tempdir()?;
        tokio::fs::write(dir.path().join(self.language.candidate_file()), source).await?;
        if self.language == ScriptLanguage::Python {
            tokio::fs::write(dir.path().join("harness.py"), PYTHON_HARNESS).await?;
        }

        let check = command_for(self.language, &self.interpreter, dir.path(), Mode::Check);
        let output = tokio::time::timeout(self.load_timeout, spawn_and_collect(check, ""))
            .await
            .map_err(|_| CompileError::Timeout(self.load_timeout))??;

        match output.status.code() {
            Some(0) => {
                debug!(dir = ?dir.path(), "ScriptRuntime::load: candidate loaded");
                Ok(Arc::new(ScriptEntryPoint {
                    dir: Arc::new(dir),
                    language: self.language,
                    interpreter: self.interpreter.clone(),
                }))
            }
            Some(MISSING_ENTRY_EXIT) => {
                debug!("ScriptRuntime::load: no entry point");
                Err(CompileError::MissingEntryPoint(ENTRY_POINT))
            }
            _ => {
                let message = describe_failure(&output);
                debug!(%message, "ScriptRuntime::load: load failed");
                Err(CompileError::Load(message))
            }
        }
    }
}

/// A loaded script candidate; its directory is removed when the last clone drops
struct ScriptEntryPoint {
    dir: Arc<TempDir>,
    language: ScriptLanguage,
    interpreter: String,
}

#[async_trait]
impl EntryPoint for ScriptEntryPoint {
    async fn invoke(&self, input: &str) -> Result<String, String> {
        debug!(input_len = input.len(), "ScriptEntryPoint::invoke: called");
        let command = command_for(self.language, &self.interpreter, self.dir.path(), Mode::Run);
        let output = spawn_and_collect(command, input)
            .await
            .map_err(|e| format!("Failed to start candidate: {}", e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(describe_failure(&output))
        }
    }
}
