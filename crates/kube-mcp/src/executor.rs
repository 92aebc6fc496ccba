//! Time-bounded kubectl execution.
//!
//! Commands are tokenized the way a POSIX shell would split them and then
//! handed straight to the process, never to `sh -c`, so shell metacharacters
//! in arguments are inert. Every run is bounded by a wall-clock timeout; on
//! expiry the child is killed and the result is flagged `timed_out`.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ExecError, FailureKind};

/// Budget for generic commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for context operations.
pub const DEFAULT_CONTEXT_TIMEOUT: Duration = Duration::from_secs(10);

/// Split a command string into arguments, honouring shell quoting.
///
/// Returns `None` for unbalanced quotes or a trailing escape.
pub fn split_command(command: &str) -> Option<Vec<String>> {
    shlex::split(command)
}

/// Captured outcome of one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code, `-1` when the process was killed by a signal or timed out.
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// The wall-clock budget expired and the child was killed.
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Result recorded when the budget expires. No partial output is kept.
    pub fn timed_out() -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }
    }

    /// Exited with code 0 within the budget.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// How the run failed, if it did.
    pub fn failure(&self) -> Option<FailureKind> {
        if self.timed_out {
            Some(FailureKind::Timeout)
        } else if self.exit_code != 0 {
            Some(FailureKind::NonZeroExit)
        } else {
            None
        }
    }
}

/// Spawns the kubectl binary with a bounded wall-clock budget.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: PathBuf,
    binary: String,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(crate::validator::KUBECTL)
    }
}

impl CommandExecutor {
    /// Create an executor that spawns `program` in place of the first token.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            binary: crate::validator::KUBECTL.to_string(),
        }
    }

    /// Run `tokens` (binary name first) and capture its output.
    ///
    /// The first token must be the kubectl binary name; the configured
    /// program is what actually starts, with the remaining tokens as its
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no tokens, the first token is not the
    /// binary name, the program is missing, or the process cannot be
    /// started. Timeouts and non-zero exits are reported on the returned
    /// [`ExecutionResult`].
    pub async fn execute(
        &self,
        tokens: &[String],
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecError> {
        let (binary, args) = tokens.split_first().ok_or(ExecError::EmptyCommand)?;
        if *binary != self.binary {
            return Err(ExecError::UnexpectedBinary {
                expected: self.binary.clone(),
                found: binary.clone(),
            });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        // Dropping the wait future on expiry drops the child, which kills it.
        let Ok(output) = tokio::time::timeout(timeout, child.wait_with_output()).await else {
            warn!(
                program = %self.program.display(),
                timeout_secs = timeout.as_secs_f64(),
                "command timed out, child killed"
            );
            return Ok(ExecutionResult::timed_out());
        };
        let output = output?;

        let result = ExecutionResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        };
        debug!(
            exit_code = result.exit_code,
            stdout_bytes = result.stdout.len(),
            stderr_bytes = result.stderr.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );
        Ok(result)
    }

    fn spawn_error(&self, err: io::Error) -> ExecError {
        let program = self
            .program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |n| n.to_string_lossy().into_owned());
        if err.kind() == io::ErrorKind::NotFound {
            ExecError::BinaryNotFound { program }
        } else {
            ExecError::Spawn {
                program,
                source: err,
            }
        }
    }
}
