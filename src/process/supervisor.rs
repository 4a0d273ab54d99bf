//! One owned child process.
//!
//! The pid is only signalled while the child has not been reaped, so a
//! recycled pid can never receive our SIGTERM.

use std::process::{Child, ChildStdout, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::{CommandSpec, ProcessError};

/// How often `stop` re-checks the child during the grace period.
const STOP_POLL: Duration = Duration::from_millis(20);

/// How a [`ManagedProcess::stop`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The child had already exited before we asked.
    AlreadyExited,
    /// It exited within the grace period after SIGTERM.
    Terminated,
    /// It outlived the grace period and was killed.
    Killed,
}

#[derive(Debug)]
pub struct ManagedProcess {
    command: String,
    child: Child,
    exit: Option<ExitStatus>,
}

impl ManagedProcess {
    /// Launch `spec` in the background with all stdio discarded.
    ///
    /// Never returns a handle for a program that failed to launch.
    pub fn start(spec: &CommandSpec) -> Result<Self, ProcessError> {
        Self::spawn_with(spec, Stdio::null(), Stdio::null())
    }

    pub(crate) fn spawn_with(
        spec: &CommandSpec,
        stdin: Stdio,
        stdout: Stdio,
    ) -> Result<Self, ProcessError> {
        let child = spec
            .command()
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProcessError::from_spawn(spec, e))?;

        log::debug!("process: started `{spec}` (pid {})", child.id());
        Ok(Self {
            command: spec.to_string(),
            child,
            exit: None,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit status, once the child has been observed to exit.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    pub(crate) fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Non-blocking liveness check.  Reaps the child if it has exited.
    pub fn is_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                log::debug!("process: `{}` exited ({status})", self.command);
                self.exit = Some(status);
                false
            }
            Err(e) => {
                log::warn!("process: cannot poll `{}`: {e}", self.command);
                false
            }
        }
    }

    /// Ask the child to exit (SIGTERM) without waiting.
    pub fn terminate(&mut self) -> Result<(), ProcessError> {
        if !self.is_alive() {
            return Ok(());
        }
        let pid = self.pid();
        // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs
        // to our unreaped child.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(ProcessError::Signal {
                command: self.command.clone(),
                pid,
                source: std::io::Error::last_os_error(),
            })
        }
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL.  Always reaps the child.
    pub fn stop(&mut self, grace: Duration) -> Result<StopOutcome, ProcessError> {
        if !self.is_alive() {
            return Ok(StopOutcome::AlreadyExited);
        }
        self.terminate()?;

        let deadline = Instant::now() + grace;
        loop {
            if !self.is_alive() {
                return Ok(StopOutcome::Terminated);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(STOP_POLL.min(deadline - now));
        }

        log::warn!(
            "process: `{}` still running {:?} after SIGTERM, killing",
            self.command,
            grace
        );
        self.kill()?;
        Ok(StopOutcome::Killed)
    }

    /// SIGKILL and reap.
    pub fn kill(&mut self) -> Result<(), ProcessError> {
        if !self.is_alive() {
            return Ok(());
        }
        if let Err(source) = self.child.kill() {
            // Raced with a natural exit; the wait below still reaps it.
            log::debug!("process: kill `{}`: {source}", self.command);
        }
        let status = self.child.wait().map_err(|source| ProcessError::Wait {
            command: self.command.clone(),
            source,
        })?;
        self.exit = Some(status);
        Ok(())
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.is_alive() {
            log::warn!("process: `{}` dropped while running, killing", self.command);
            if let Err(e) = self.kill() {
                log::error!("process: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper() -> CommandSpec {
        CommandSpec::new("sleep").arg("30")
    }

    fn pid_exists(pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[test]
    fn missing_binary_returns_no_handle() {
        let err = ManagedProcess::start(&CommandSpec::new("no-such-recorder-binary")).unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[test]
    fn stop_terminates_cooperative_child() {
        let mut p = ManagedProcess::start(&sleeper()).unwrap();
        assert!(p.is_alive());

        let outcome = p.stop(Duration::from_secs(2)).unwrap();

        assert_eq!(outcome, StopOutcome::Terminated);
        assert!(!p.is_alive());
        assert!(p.exit_status().is_some());
    }

    #[test]
    fn stop_kills_child_ignoring_sigterm() {
        // The ignored disposition survives exec.
        let spec = CommandSpec::new("sh").args(["-c", "trap '' TERM; exec sleep 30"]);
        let mut p = ManagedProcess::start(&spec).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        let outcome = p.stop(Duration::from_millis(200)).unwrap();

        assert_eq!(outcome, StopOutcome::Killed);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!p.is_alive());
    }

    #[test]
    fn stop_after_exit_is_a_no_op() {
        let mut p = ManagedProcess::start(&CommandSpec::new("true")).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while p.is_alive() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(p.stop(Duration::from_millis(100)).unwrap(), StopOutcome::AlreadyExited);
        assert_eq!(p.stop(Duration::from_millis(100)).unwrap(), StopOutcome::AlreadyExited);
    }

    #[test]
    fn drop_kills_running_child() {
        let p = ManagedProcess::start(&sleeper()).unwrap();
        let pid = p.pid();
        assert!(pid_exists(pid));

        drop(p);

        assert!(!pid_exists(pid));
    }
}
