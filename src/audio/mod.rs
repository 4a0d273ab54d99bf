//! The external audio programs the appliance drives.
//!
//! ```text
//! record button ──▶ arecord -D <mic> -f cd -t wav <file>          (recorder)
//! power on      ──▶ arecord -D <mic> ... - │ aplay -D <speaker>    (passthrough)
//! vol / mute    ──▶ amixer -c <card> set <control> capture ...     (mixer)
//! ```
//!
//! Every command line is derived from [`AudioConfig`] once, up front, into an
//! [`AudioCommands`] bundle that the controller owns.

pub mod mixer;
pub mod passthrough;
pub mod recorder;

pub use mixer::{AmixerMixer, MixerControl, MixerError};
pub use passthrough::Passthrough;
pub use recorder::start_recording;

use std::path::PathBuf;

use crate::config::AudioConfig;
use crate::process::CommandSpec;

/// The long-running command lines, resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCommands {
    /// Capture to the fixed recording file.
    pub record: CommandSpec,
    /// Where `record` writes; its parent directory is created on demand.
    pub recording_file: PathBuf,
    /// Raw capture to stdout, first half of the passthrough pipeline.
    pub passthrough_source: CommandSpec,
    /// Raw playback from stdin, second half of the passthrough pipeline.
    pub passthrough_sink: CommandSpec,
}

impl AudioCommands {
    pub fn from_config(cfg: &AudioConfig) -> Self {
        let recording_file = cfg.recording_path();
        Self {
            record: CommandSpec::new(&cfg.capture_program)
                .args(["-D", cfg.microphone.as_str(), "-f", "cd", "-t", "wav"])
                // Lossless: `AppConfig::validate` rejects non-UTF-8 paths.
                .arg(recording_file.to_string_lossy()),
            recording_file,
            passthrough_source: CommandSpec::new(&cfg.capture_program)
                .args(["-D", cfg.microphone.as_str(), "-f", "cd", "-t", "raw", "-"]),
            passthrough_sink: CommandSpec::new(&cfg.playback_program)
                .args(["-D", cfg.speaker.as_str(), "-f", "cd", "-t", "raw"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines_follow_config() {
        let cfg = AudioConfig {
            recording_file: Some(PathBuf::from("/data/take.wav")),
            ..AudioConfig::default()
        };
        let cmds = AudioCommands::from_config(&cfg);

        assert_eq!(
            cmds.record.to_string(),
            "arecord -D plughw:ATR4650USB -f cd -t wav /data/take.wav"
        );
        assert_eq!(
            cmds.passthrough_source.to_string(),
            "arecord -D plughw:ATR4650USB -f cd -t raw -"
        );
        assert_eq!(cmds.passthrough_sink.to_string(), "aplay -D hw:2,0 -f cd -t raw");
        assert_eq!(cmds.recording_file, PathBuf::from("/data/take.wav"));
    }
}
