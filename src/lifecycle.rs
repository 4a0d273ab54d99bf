//! Startup, the wait for shutdown, and teardown.
//!
//! # Threads
//!
//! ```text
//! pin source ──▶ button-power ────┐
//!            ──▶ button-volume-up ┤
//!            ──▶ ...              ├──▶ Controller (one lock)
//!            ──▶ button-mute ─────┘
//! tokio task: wait for Shutdown, reconcile dead processes once a second
//! ```
//!
//! One handler thread per button keeps a slow transition on one button (a
//! recording stop waiting out its grace period) from delaying the others
//! past the controller lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Notify;

use crate::controller::Controller;
use crate::gpio::{Button, IndicatorOutputs, PinEventSource};

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// One-shot stop request shared between the controller, signal handlers and
/// the main task.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent; callable from any thread.
    pub fn request(&self) {
        if !self.inner.requested.swap(true, Ordering::AcqRel) {
            log::info!("lifecycle: shutdown requested");
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Resolves once [`request`](Self::request) has been called, including
    /// calls made before `wait` started.
    pub async fn wait(&self) {
        loop {
            // Register before checking the flag so a request landing in
            // between still wakes us.
            let notified = self.inner.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

pub struct Lifecycle {
    controller: Arc<Controller>,
    pins: Box<dyn PinEventSource>,
    outputs: Arc<dyn IndicatorOutputs>,
    shutdown: Shutdown,
    debounce: Duration,
    watch_interval: Duration,
}

impl Lifecycle {
    pub fn new(
        controller: Arc<Controller>,
        pins: Box<dyn PinEventSource>,
        outputs: Arc<dyn IndicatorOutputs>,
        shutdown: Shutdown,
        debounce: Duration,
    ) -> Self {
        Self {
            controller,
            pins,
            outputs,
            shutdown,
            debounce,
            watch_interval: Duration::from_secs(1),
        }
    }

    /// How often dead recorder/passthrough processes are looked for.
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    /// Run until shutdown is requested.  Teardown always runs, also when
    /// button registration fails part way.
    pub async fn run(mut self) -> Result<()> {
        if let Err(e) = self.outputs.all_off() {
            log::warn!("lifecycle: {e}");
        }

        let mut handlers = Vec::with_capacity(Button::ALL.len());
        if let Err(e) = self.spawn_handlers(&mut handlers) {
            self.teardown(handlers);
            return Err(e);
        }
        log::info!("lifecycle: ready, press power to start");

        wait_for_shutdown(
            Arc::clone(&self.controller),
            self.shutdown.clone(),
            self.watch_interval,
        )
        .await;
        self.teardown(handlers);
        Ok(())
    }

    /// Threads started before a failure stay in `handlers` so teardown can
    /// join them.
    fn spawn_handlers(&mut self, handlers: &mut Vec<JoinHandle<()>>) -> Result<()> {
        for button in Button::ALL {
            let presses = self
                .pins
                .register(button, self.debounce)
                .with_context(|| format!("registering {} button", button.label()))?;

            let controller = Arc::clone(&self.controller);
            let handle = std::thread::Builder::new()
                .name(format!("button-{}", button.label()))
                .spawn(move || {
                    for press in presses {
                        log::debug!(
                            "lifecycle: {} pressed ({:?} ago)",
                            press.button.label(),
                            press.at.elapsed()
                        );
                        if let Err(e) = controller.handle(press.button) {
                            log::error!("controller: {e}");
                        }
                    }
                })
                .with_context(|| format!("spawning {} handler", button.label()))?;
            handlers.push(handle);
        }
        Ok(())
    }

    /// Controller first (lights, recording, passthrough, blinker), then the
    /// pin source so the handler streams end, then the output lines.
    fn teardown(&mut self, handlers: Vec<JoinHandle<()>>) {
        log::info!("lifecycle: shutting down");
        self.controller.shutdown();

        self.pins.release();
        for handle in handlers {
            if handle.join().is_err() {
                log::error!("lifecycle: a button handler panicked");
            }
        }

        self.outputs.release();
        log::info!("lifecycle: stopped");
    }
}

async fn wait_for_shutdown(controller: Arc<Controller>, shutdown: Shutdown, interval: Duration) {
    let mut watch = tokio::time::interval(interval);
    watch.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = watch.tick() => {
                let controller = Arc::clone(&controller);
                if let Err(e) =
                    tokio::task::spawn_blocking(move || controller.check_processes()).await
                {
                    log::error!("lifecycle: process check failed: {e}");
                }
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
    use crate::audio::mixer::fake::RecordingMixer;
    use crate::audio::AudioCommands;
    use crate::controller::ControllerSettings;
    use crate::gpio::testing::ScriptedPins;
    use crate::gpio::{Indicator, Level, LoggedIndicators};
    use crate::process::CommandSpec;
    use std::time::Instant;

    #[tokio::test]
    async fn wait_returns_for_early_request() {
        let shutdown = Shutdown::new();
        shutdown.request();
        shutdown.request();
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("wait should resolve");
    }

    #[tokio::test]
    async fn wait_wakes_on_request_from_other_thread() {
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.request();
        });
        tokio::time::timeout(Duration::from_secs(2), shutdown.wait())
            .await
            .expect("wait should resolve");
        assert!(shutdown.is_requested());
    }

    struct Harness {
        lifecycle: Lifecycle,
        controller: Arc<Controller>,
        pins: ScriptedPins,
        outputs: Arc<LoggedIndicators>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = Shutdown::new();
        let outputs = Arc::new(LoggedIndicators::new());
        let settings = ControllerSettings {
            commands: AudioCommands {
                record: CommandSpec::new("sleep").arg("30"),
                recording_file: dir.path().join("recording.wav"),
                passthrough_source: CommandSpec::new("sleep").arg("30"),
                passthrough_sink: CommandSpec::new("cat"),
            },
            volume_levels: vec![0, 20, 40, 60, 80, 100],
            initial_volume_index: 2,
            blink_interval: Duration::from_millis(20),
            stop_grace: Duration::from_secs(1),
        };
        let controller = Arc::new(Controller::new(
            settings,
            outputs.clone(),
            Arc::new(RecordingMixer::default()),
            shutdown.clone(),
        ));
        let pins = ScriptedPins::new();
        let lifecycle = Lifecycle::new(
            controller.clone(),
            Box::new(pins.clone()),
            outputs.clone(),
            shutdown,
            Duration::from_millis(300),
        )
        .with_watch_interval(Duration::from_millis(50));

        Harness {
            lifecycle,
            controller,
            pins,
            outputs,
            _dir: dir,
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !check() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn power_cycle_runs_to_clean_teardown() {
        let Harness {
            lifecycle,
            controller,
            pins,
            outputs,
            _dir,
        } = harness();
        let run = tokio::spawn(lifecycle.run());

        wait_until(|| pins.registered() == Button::ALL.len()).await;
        assert!(pins.press(Button::Power));
        wait_until(|| controller.snapshot().powered).await;

        assert!(pins.press(Button::Record));
        wait_until(|| controller.snapshot().recording).await;
        assert!(pins.press(Button::VolumeUp));
        wait_until(|| controller.snapshot().volume_index == 3).await;

        assert!(pins.press(Button::Power));
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("lifecycle should stop after power off")
            .unwrap()
            .unwrap();

        let state = controller.snapshot();
        assert!(!state.powered);
        assert!(!state.recording);
        assert!(pins.is_released());
        for indicator in Indicator::ALL {
            assert_eq!(outputs.level(indicator), Level::Low);
        }
    }

    #[tokio::test]
    async fn external_shutdown_tears_down_powered_device() {
        let h = harness();
        let shutdown = h.lifecycle.shutdown.clone();
        let run = tokio::spawn(h.lifecycle.run());

        wait_until(|| h.pins.registered() == Button::ALL.len()).await;
        h.pins.press(Button::Power);
        wait_until(|| h.controller.snapshot().powered).await;

        shutdown.request();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("lifecycle should stop on request")
            .unwrap()
            .unwrap();

        assert!(!h.controller.snapshot().powered);
        assert_eq!(h.outputs.level(Indicator::Power), Level::Low);
        assert!(h.pins.is_released());
        // Handler threads are gone, so nothing receives presses any more.
        assert!(!h.pins.press(Button::Power));
    }

    /// Refuses the record button.
    struct BrokenPins(ScriptedPins);

    impl PinEventSource for BrokenPins {
        fn register(
            &mut self,
            button: Button,
            debounce: Duration,
        ) -> Result<std::sync::mpsc::Receiver<crate::gpio::ButtonPress>, crate::gpio::GpioError>
        {
            if button == Button::Record {
                return Err(crate::gpio::GpioError::AlreadyRegistered(button));
            }
            self.0.register(button, debounce)
        }

        fn release(&mut self) {
            self.0.release();
        }
    }

    #[tokio::test]
    async fn registration_failure_joins_started_handlers() {
        let Harness {
            lifecycle: unused,
            controller,
            outputs,
            _dir,
            ..
        } = harness();
        drop(unused);
        let pins = ScriptedPins::new();
        let lifecycle = Lifecycle::new(
            controller.clone(),
            Box::new(BrokenPins(pins.clone())),
            outputs,
            Shutdown::new(),
            Duration::from_millis(300),
        );

        let err = lifecycle.run().await.unwrap_err();

        assert!(err.to_string().contains("record"));
        assert!(pins.is_released());
        // Power and both volume handlers were started before the failure;
        // each held a controller clone until it was joined.
        assert_eq!(Arc::strong_count(&controller), 1);
    }
}
