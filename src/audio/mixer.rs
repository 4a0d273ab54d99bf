//! Capture gain and capture switch via the ALSA mixer utility.

use thiserror::Error;

use crate::config::AudioConfig;
use crate::process::{run_to_completion, CommandSpec, ProcessError};

#[derive(Debug, Error)]
pub enum MixerError {
    #[error("mixer command failed: {0}")]
    Command(#[from] ProcessError),
}

/// Synchronous mixer operations used by the controller.
pub trait MixerControl: Send + Sync {
    fn set_capture_volume(&self, percent: u8) -> Result<(), MixerError>;

    /// `enabled == false` mutes capture.
    fn set_capture_switch(&self, enabled: bool) -> Result<(), MixerError>;
}

// Compile-time assertion: Box<dyn MixerControl> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn MixerControl>) {}
};

// ---------------------------------------------------------------------------
// AmixerMixer
// ---------------------------------------------------------------------------

/// `amixer -c <card> set <control> capture ...`
#[derive(Debug, Clone)]
pub struct AmixerMixer {
    program: String,
    card: String,
    control: String,
}

impl AmixerMixer {
    pub fn from_config(cfg: &AudioConfig) -> Self {
        Self {
            program: cfg.mixer_program.clone(),
            card: cfg.mixer_card.clone(),
            control: cfg.mute_control.clone(),
        }
    }

    fn capture_command(&self, value: String) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(["-c", self.card.as_str(), "set", self.control.as_str(), "capture"])
            .arg(value)
    }

    pub fn volume_command(&self, percent: u8) -> CommandSpec {
        self.capture_command(format!("{percent}%"))
    }

    pub fn switch_command(&self, enabled: bool) -> CommandSpec {
        self.capture_command(if enabled { "on" } else { "off" }.to_string())
    }
}

impl MixerControl for AmixerMixer {
    fn set_capture_volume(&self, percent: u8) -> Result<(), MixerError> {
        run_to_completion(&self.volume_command(percent))?;
        Ok(())
    }

    fn set_capture_switch(&self, enabled: bool) -> Result<(), MixerError> {
        run_to_completion(&self.switch_command(enabled))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MixerCall {
        Volume(u8),
        Switch(bool),
    }

    /// Records every call; optionally fails volume or switch commands.
    #[derive(Debug, Default)]
    pub struct RecordingMixer {
        pub calls: Mutex<Vec<MixerCall>>,
        pub fail_volume: bool,
        pub fail_switch: bool,
    }

    fn unavailable() -> MixerError {
        MixerError::Command(ProcessError::NotFound {
            program: "amixer".into(),
        })
    }

    impl RecordingMixer {
        pub fn failing_volume() -> Self {
            Self {
                fail_volume: true,
                ..Self::default()
            }
        }

        pub fn failing_switch() -> Self {
            Self {
                fail_switch: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<MixerCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MixerControl for RecordingMixer {
        fn set_capture_volume(&self, percent: u8) -> Result<(), MixerError> {
            self.calls.lock().unwrap().push(MixerCall::Volume(percent));
            if self.fail_volume {
                return Err(unavailable());
            }
            Ok(())
        }

        fn set_capture_switch(&self, enabled: bool) -> Result<(), MixerError> {
            self.calls.lock().unwrap().push(MixerCall::Switch(enabled));
            if self.fail_switch {
                return Err(unavailable());
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines_match_amixer_syntax() {
        let mixer = AmixerMixer::from_config(&AudioConfig::default());
        assert_eq!(
            mixer.volume_command(60).to_string(),
            "amixer -c 3 set Mic capture 60%"
        );
        assert_eq!(
            mixer.switch_command(false).to_string(),
            "amixer -c 3 set Mic capture off"
        );
        assert_eq!(
            mixer.switch_command(true).to_string(),
            "amixer -c 3 set Mic capture on"
        );
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let cfg = AudioConfig {
            mixer_program: "false".into(),
            ..AudioConfig::default()
        };
        let err = AmixerMixer::from_config(&cfg).set_capture_volume(20).unwrap_err();
        assert!(matches!(
            err,
            MixerError::Command(ProcessError::ExitStatus { ref command, .. })
                if command == "false -c 3 set Mic capture 20%"
        ));
    }

    #[test]
    fn missing_utility_is_an_error() {
        let cfg = AudioConfig {
            mixer_program: "no-such-mixer-utility".into(),
            ..AudioConfig::default()
        };
        let err = AmixerMixer::from_config(&cfg).set_capture_switch(true).unwrap_err();
        assert!(matches!(err, MixerError::Command(ProcessError::NotFound { .. })));
    }

    #[test]
    fn zero_exit_is_success() {
        let cfg = AudioConfig {
            mixer_program: "true".into(),
            ..AudioConfig::default()
        };
        let mixer = AmixerMixer::from_config(&cfg);
        mixer.set_capture_volume(100).unwrap();
        mixer.set_capture_switch(false).unwrap();
    }
}
