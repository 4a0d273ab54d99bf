//! Two processes chained stdout → stdin, both owned.

use std::process::Stdio;
use std::time::Duration;

use super::{CommandSpec, ManagedProcess, ProcessError, StopOutcome};

#[derive(Debug)]
pub struct ProcessPipeline {
    producer: ManagedProcess,
    consumer: ManagedProcess,
}

impl ProcessPipeline {
    /// Start `producer | consumer`.
    ///
    /// If the consumer fails to launch the producer is killed before the
    /// error is returned.
    pub fn start(producer: &CommandSpec, consumer: &CommandSpec) -> Result<Self, ProcessError> {
        let mut producer = ManagedProcess::spawn_with(producer, Stdio::null(), Stdio::piped())?;
        let pipe = producer
            .take_stdout()
            .map(Stdio::from)
            .unwrap_or_else(Stdio::null);

        let consumer = ManagedProcess::spawn_with(consumer, pipe, Stdio::null())?;
        Ok(Self { producer, consumer })
    }

    /// True only while both ends are running.
    pub fn is_alive(&mut self) -> bool {
        let producer = self.producer.is_alive();
        let consumer = self.consumer.is_alive();
        producer && consumer
    }

    pub fn pids(&self) -> (u32, u32) {
        (self.producer.pid(), self.consumer.pid())
    }

    /// Stop the producer, then the consumer, each with `grace` before SIGKILL.
    ///
    /// The consumer is stopped even when stopping the producer fails.
    pub fn stop(&mut self, grace: Duration) -> Result<(StopOutcome, StopOutcome), ProcessError> {
        let producer = self.producer.stop(grace);
        let consumer = self.consumer.stop(grace);
        Ok((producer?, consumer?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_processes_run_and_stop() {
        let mut p = ProcessPipeline::start(
            &CommandSpec::new("sleep").arg("30"),
            &CommandSpec::new("cat"),
        )
        .unwrap();
        assert!(p.is_alive());
        let (a, b) = p.pids();
        assert_ne!(a, b);

        let (producer, consumer) = p.stop(Duration::from_secs(2)).unwrap();

        assert_eq!(producer, StopOutcome::Terminated);
        // `cat` may already have exited on EOF.
        assert_ne!(consumer, StopOutcome::Killed);
        assert!(!p.is_alive());
    }

    #[test]
    fn dead_consumer_means_not_alive() {
        let mut p =
            ProcessPipeline::start(&CommandSpec::new("sleep").arg("30"), &CommandSpec::new("true"))
                .unwrap();
        std::thread::sleep(Duration::from_millis(300));
        assert!(!p.is_alive());
        p.stop(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn missing_consumer_fails_start() {
        let err = ProcessPipeline::start(
            &CommandSpec::new("sleep").arg("30"),
            &CommandSpec::new("no-such-playback-binary"),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }
}
