//! Live microphone → speaker routing while the device is powered.
//!
//! No restart on failure: if the pipeline dies, passthrough stays off until
//! the next power cycle.

use std::time::Duration;

use crate::process::{CommandSpec, ProcessError, ProcessPipeline};

#[derive(Debug)]
pub struct Passthrough {
    source: CommandSpec,
    sink: CommandSpec,
    running: Option<ProcessPipeline>,
}

impl Passthrough {
    pub fn new(source: CommandSpec, sink: CommandSpec) -> Self {
        Self {
            source,
            sink,
            running: None,
        }
    }

    /// Start the pipeline.  A pipeline that is still fully alive is kept.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        if self.is_alive() {
            log::debug!("passthrough: already running");
            return Ok(());
        }
        // Reap any half-dead previous pipeline before replacing it.
        self.running = None;

        log::info!("passthrough: starting `{} | {}`", self.source, self.sink);
        self.running = Some(ProcessPipeline::start(&self.source, &self.sink)?);
        Ok(())
    }

    /// Stop the pipeline if one exists.  Idempotent.
    pub fn stop(&mut self, grace: Duration) {
        let Some(mut pipeline) = self.running.take() else {
            return;
        };
        log::info!("passthrough: stopping");
        match pipeline.stop(grace) {
            Ok((source, sink)) => {
                log::debug!("passthrough: source {source:?}, sink {sink:?}");
            }
            Err(e) => log::error!("passthrough: {e}"),
        }
    }

    /// Both ends alive.
    pub fn is_alive(&mut self) -> bool {
        self.running.as_mut().is_some_and(|p| p.is_alive())
    }

    /// A handle is held (alive or not).
    pub fn has_handle(&self) -> bool {
        self.running.is_some()
    }

    /// `(source, sink)` pids of the held pipeline.
    pub fn pids(&self) -> Option<(u32, u32)> {
        self.running.as_ref().map(ProcessPipeline::pids)
    }
}
