//! External process supervision.
//!
//! * [`CommandSpec`]: program + argument list, displayable for log lines.
//! * [`ManagedProcess`]: one owned child: liveness polling, SIGTERM with a
//!   bounded grace period, SIGKILL escalation.  Dropping a live one kills it.
//! * [`ProcessPipeline`]: two children with the first one's stdout piped
//!   into the second one's stdin, both owned.
//! * [`run_to_completion`]: run a short command synchronously and turn a
//!   non-zero exit into [`ProcessError::ExitStatus`].

pub mod pipeline;
pub mod supervisor;

pub use pipeline::ProcessPipeline;
pub use supervisor::{ManagedProcess, StopOutcome};

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

// ---------------------------------------------------------------------------
// ProcessError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program is not installed / not on `PATH`.
    #[error("`{program}` not found (is it installed and on PATH?)")]
    NotFound { program: String },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and reported failure.
    #[error("`{command}` failed: {status}")]
    ExitStatus {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Setting up for a launch (such as creating the output directory)
    /// failed before anything was started.
    #[error("cannot prepare {}: {source}", .path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("waiting on `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot signal `{command}` (pid {pid}): {source}")]
    Signal {
        command: String,
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    fn from_spawn(spec: &CommandSpec, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound {
                program: spec.program.clone(),
            }
        } else {
            ProcessError::Spawn {
                command: spec.to_string(),
                source,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// A program and its arguments.  No shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// run_to_completion
// ---------------------------------------------------------------------------

/// Run `spec` to completion with stdin/stdout discarded.
///
/// # Errors
///
/// [`ProcessError::NotFound`] when the program is missing, and
/// [`ProcessError::ExitStatus`] (carrying the exact command line and status)
/// when it exits non-zero.
pub fn run_to_completion(spec: &CommandSpec) -> Result<(), ProcessError> {
    log::debug!("process: running `{spec}`");
    let output = spec
        .command()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ProcessError::from_spawn(spec, e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ProcessError::ExitStatus {
            command: spec.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
