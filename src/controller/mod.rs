//! The appliance state machine.
//!
//! # Concurrency
//!
//! Every button has its own handler thread (see `lifecycle`), so handlers
//! may run concurrently.  They are serialized by one mutex around [`Inner`]:
//! each handler takes the lock, does its whole transition including any
//! process start or stop, and releases it.  Indicator writes and mixer
//! commands are issued while the lock is held, which keeps the lights in the
//! same order as the state changes.
//!
//! The blink worker is the only thing that touches device state without the
//! lock.  It only *reads* the recording flag.
//!
//! # Transitions
//!
//! | Button      | While off              | While on                                   |
//! |-------------|------------------------|--------------------------------------------|
//! | Power       | on, start passthrough  | stop everything, off, request shutdown     |
//! | Volume ±    | ignored                | step gain, clamped at both ends            |
//! | Mute        | ignored                | flip capture switch and mute light         |
//! | Record      | ignored                | start/stop capture-to-file and blinker     |

pub mod blink;
pub mod state;

pub use blink::BlinkWorker;
pub use state::{volume_bar, DeviceState, RecordingFlag, VolumeLevels};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;

use crate::audio::{start_recording, AudioCommands, MixerControl, MixerError, Passthrough};
use crate::config::AppConfig;
use crate::gpio::{Button, Indicator, IndicatorOutputs, Level};
use crate::languages;
use crate::lifecycle::Shutdown;
use crate::process::{ManagedProcess, ProcessError};

use state::LiveState;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("recording could not start: {0}")]
    RecordingStart(#[source] ProcessError),

    /// The mute flag and light already show the requested state; the
    /// hardware switch may not.
    #[error("capture switch not applied (muted={muted}): {source}")]
    Mute {
        muted: bool,
        #[source]
        source: MixerError,
    },

    #[error("unknown language `{0}`")]
    UnknownLanguage(String),
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the controller needs from configuration, resolved once.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub commands: AudioCommands,
    pub volume_levels: Vec<u8>,
    pub initial_volume_index: usize,
    pub blink_interval: Duration,
    pub stop_grace: Duration,
}

impl ControllerSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            commands: AudioCommands::from_config(&cfg.audio),
            volume_levels: cfg.audio.volume_levels.clone(),
            initial_volume_index: cfg.audio.initial_volume_index,
            blink_interval: Duration::from_millis(cfg.timing.blink_interval_ms),
            stop_grace: Duration::from_millis(cfg.timing.stop_grace_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

struct Inner {
    state: LiveState,
    recorder: Option<ManagedProcess>,
    blink: Option<BlinkWorker>,
    passthrough: Passthrough,
    /// Set by teardown; late presses are dropped.
    closed: bool,
}

pub struct Controller {
    inner: Mutex<Inner>,
    outputs: Arc<dyn IndicatorOutputs>,
    mixer: Arc<dyn MixerControl>,
    shutdown: Shutdown,
    commands: AudioCommands,
    blink_interval: Duration,
    stop_grace: Duration,
}

impl Controller {
    pub fn new(
        settings: ControllerSettings,
        outputs: Arc<dyn IndicatorOutputs>,
        mixer: Arc<dyn MixerControl>,
        shutdown: Shutdown,
    ) -> Self {
        let ControllerSettings {
            commands,
            volume_levels,
            initial_volume_index,
            blink_interval,
            stop_grace,
        } = settings;

        let passthrough = Passthrough::new(
            commands.passthrough_source.clone(),
            commands.passthrough_sink.clone(),
        );
        let state = LiveState::new(VolumeLevels::new(volume_levels, initial_volume_index));

        Self {
            inner: Mutex::new(Inner {
                state,
                recorder: None,
                blink: None,
                passthrough,
                closed: false,
            }),
            outputs,
            mixer,
            shutdown,
            commands,
            blink_interval,
            stop_grace,
        }
    }

    /// Route a press to its handler.
    pub fn handle(&self, button: Button) -> Result<(), ControllerError> {
        match button {
            Button::Power => self.on_power_toggle(),
            Button::VolumeUp => self.on_volume_up(),
            Button::VolumeDown => self.on_volume_down(),
            Button::Mute => self.on_mute_toggle(),
            Button::Record => self.on_record_toggle(),
        }
    }

    pub fn snapshot(&self) -> DeviceState {
        self.lock().state.snapshot()
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    pub fn on_power_toggle(&self) -> Result<(), ControllerError> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }

        if !inner.state.powered {
            inner.state.powered = true;
            self.set_indicator(Indicator::Power, Level::High);
            log::info!("controller: device on");
            if let Err(e) = inner.passthrough.start() {
                log::error!("controller: passthrough unavailable: {e}");
            }
            return Ok(());
        }

        self.set_indicator(Indicator::Power, Level::Low);
        self.set_indicator(Indicator::Mute, Level::Low);
        self.stop_recording(&mut inner);
        inner.passthrough.stop(self.stop_grace);
        inner.state.muted = false;
        inner.state.powered = false;
        log::info!("controller: device off");
        self.shutdown.request();
        Ok(())
    }

    pub fn on_volume_up(&self) -> Result<(), ControllerError> {
        self.step_volume(true)
    }

    pub fn on_volume_down(&self) -> Result<(), ControllerError> {
        self.step_volume(false)
    }

    pub fn on_mute_toggle(&self) -> Result<(), ControllerError> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        if !inner.state.powered {
            log::info!("controller: mute ignored, device is off");
            return Ok(());
        }

        let muted = !inner.state.muted;
        inner.state.muted = muted;
        self.set_indicator(Indicator::Mute, Level::from_bool(muted));

        match self.mixer.set_capture_switch(!muted) {
            Ok(()) => {
                log::info!("controller: microphone {}", if muted { "muted" } else { "live" });
                Ok(())
            }
            Err(source) => {
                log::error!("controller: mute command failed: {source}");
                Err(ControllerError::Mute { muted, source })
            }
        }
    }

    pub fn on_record_toggle(&self) -> Result<(), ControllerError> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        if !inner.state.powered {
            log::info!("controller: record ignored, device is off");
            return Ok(());
        }

        if inner.state.recording.get() {
            self.stop_recording(&mut inner);
            log::info!(
                "controller: recording saved to {}",
                self.commands.recording_file.display()
            );
            return Ok(());
        }

        inner.state.recording.set(true);
        let process = match start_recording(&self.commands.record, &self.commands.recording_file)
        {
            Ok(process) => process,
            Err(e) => {
                inner.state.recording.set(false);
                log::error!("controller: {e}");
                return Err(ControllerError::RecordingStart(e));
            }
        };
        inner.recorder = Some(process);

        match BlinkWorker::spawn(
            inner.state.recording.clone(),
            self.outputs.clone(),
            Indicator::Record,
            self.blink_interval,
        ) {
            Ok(worker) => inner.blink = Some(worker),
            Err(e) => log::warn!("controller: record indicator unavailable: {e}"),
        }
        log::info!("controller: recording started");
        Ok(())
    }

    /// Store the translation language pair.  Both names must be in the
    /// catalog; nothing changes otherwise.  Allowed whether or not the
    /// device is powered.
    pub fn select_languages(&self, first: &str, second: &str) -> Result<(), ControllerError> {
        let lookup = |query: &str| {
            languages::lookup(query).ok_or_else(|| ControllerError::UnknownLanguage(query.into()))
        };
        let (first, second) = (lookup(first)?, lookup(second)?);

        let mut inner = self.lock();
        inner.state.language_pair = (first.name.to_string(), second.name.to_string());
        log::info!("controller: languages {} -> {}", first.name, second.name);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Supervision and teardown
    // -----------------------------------------------------------------------

    /// Reconcile state with processes that died on their own.
    ///
    /// A recorder that exited clears the recording state (and with it the
    /// blinking light).  A broken passthrough is reaped and not restarted.
    pub fn check_processes(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }

        let recorder_died = inner.recorder.as_mut().is_some_and(|p| !p.is_alive());
        if recorder_died {
            if let Some(status) = inner.recorder.as_ref().and_then(|p| p.exit_status()) {
                log::warn!("controller: recording process exited on its own ({status})");
            }
            self.stop_recording(&mut inner);
        }

        if inner.passthrough.has_handle() && !inner.passthrough.is_alive() {
            log::warn!("controller: passthrough stopped unexpectedly");
            inner.passthrough.stop(self.stop_grace);
        }
    }

    /// Final cleanup: lights off, recording stopped, passthrough stopped,
    /// blink worker joined.  Later presses are ignored.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;

        if let Err(e) = self.outputs.all_off() {
            log::warn!("controller: {e}");
        }
        self.stop_recording(&mut inner);
        inner.passthrough.stop(self.stop_grace);
        inner.state.muted = false;
        inner.state.powered = false;
        log::info!("controller: torn down");
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn step_volume(&self, up: bool) -> Result<(), ControllerError> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        if !inner.state.powered {
            log::info!("controller: volume locked, device is off");
            return Ok(());
        }

        let volume = &mut inner.state.volume;
        let stepped = if up { volume.step_up() } else { volume.step_down() };
        let Some(percent) = stepped else {
            log::debug!("controller: volume already at level {}", volume.index());
            return Ok(());
        };

        if let Err(e) = self.mixer.set_capture_volume(percent) {
            log::error!("controller: {e}");
        }
        log::info!(
            "controller: Volume: level {} ({percent}%) [{}]",
            volume.index(),
            volume.bar()
        );
        Ok(())
    }

    /// Idempotent.  Signals the recorder first, then clears the flag so the
    /// blinker exits, then waits for the blinker.
    fn stop_recording(&self, inner: &mut Inner) {
        if let Some(mut process) = inner.recorder.take() {
            match process.stop(self.stop_grace) {
                Ok(outcome) => log::debug!("controller: recorder {outcome:?}"),
                Err(e) => log::error!("controller: {e}"),
            }
        }
        inner.state.recording.set(false);
        if let Some(worker) = inner.blink.take() {
            worker.join();
        }
    }

    fn set_indicator(&self, indicator: Indicator, level: Level) {
        if let Err(e) = self.outputs.set(indicator, level) {
            log::warn!("controller: {e}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
