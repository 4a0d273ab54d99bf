//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Every section carries
//! `#[serde(default)]`, so a partial `settings.toml` only overrides the keys
//! it names.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

/// Which pin backend drives the buttons and indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Kernel sysfs GPIO files (`/sys/class/gpio`) (the real appliance).
    Sysfs,
    /// Keyboard keys stand in for buttons; indicator changes are logged.
    Keyboard,
}

impl Default for BackendKind {
    fn default() -> Self {
        Self::Sysfs
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sysfs" => Ok(Self::Sysfs),
            "keyboard" => Ok(Self::Keyboard),
            other => Err(format!("unknown backend `{other}` (expected sysfs or keyboard)")),
        }
    }
}

// ---------------------------------------------------------------------------
// GpioConfig
// ---------------------------------------------------------------------------

/// Pin assignments and input sampling parameters.
///
/// Line numbers are whatever the sysfs backend should export; the defaults
/// are the board header positions the appliance was wired with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub backend: BackendKind,
    /// Root of the sysfs GPIO tree.
    pub sysfs_root: PathBuf,

    pub power_button: u32,
    pub volume_up_button: u32,
    pub volume_down_button: u32,
    pub record_button: u32,
    pub mute_button: u32,

    pub power_led: u32,
    pub mute_led: u32,
    pub record_led: u32,

    /// Minimum time between two accepted presses on the same button.
    pub debounce_ms: u64,
    /// How often the sysfs backend samples each input line.
    pub poll_interval_ms: u64,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            power_button: 13,
            volume_up_button: 16,
            volume_down_button: 18,
            record_button: 22,
            mute_button: 7,
            power_led: 15,
            mute_led: 31,
            record_led: 29,
            debounce_ms: 300,
            poll_interval_ms: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// ALSA devices, mixer controls and external program names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture device passed to `arecord -D`.
    pub microphone: String,
    /// Playback device passed to `aplay -D`.
    pub speaker: String,
    /// Card number passed to `amixer -c`.
    pub mixer_card: String,
    /// Simple mixer control carrying capture gain and capture switch.
    pub mute_control: String,
    /// Where the recording is written.  `None` means the data directory.
    pub recording_file: Option<PathBuf>,
    /// Ascending capture gain steps in percent.
    pub volume_levels: Vec<u8>,
    /// Index into `volume_levels` at startup.
    pub initial_volume_index: usize,

    pub capture_program: String,
    pub playback_program: String,
    pub mixer_program: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            microphone: "plughw:ATR4650USB".into(),
            speaker: "hw:2,0".into(),
            mixer_card: "3".into(),
            mute_control: "Mic".into(),
            recording_file: None,
            volume_levels: vec![0, 20, 40, 60, 80, 100],
            initial_volume_index: 2,
            capture_program: "arecord".into(),
            playback_program: "aplay".into(),
            mixer_program: "amixer".into(),
        }
    }
}

impl AudioConfig {
    /// The recording path, falling back to the platform data directory.
    pub fn recording_path(&self) -> PathBuf {
        self.recording_file
            .clone()
            .unwrap_or_else(|| AppPaths::new().recording_file)
    }
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Half period of the record indicator blink.
    pub blink_interval_ms: u64,
    /// How long a child gets after SIGTERM before it is killed.
    pub stop_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            blink_interval_ms: 500,
            stop_grace_ms: 1_000,
        }
    }
}

// ---------------------------------------------------------------------------
// KeyboardConfig
// ---------------------------------------------------------------------------

/// Key bindings for the keyboard backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub power: String,
    pub volume_up: String,
    pub volume_down: String,
    pub record: String,
    pub mute: String,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            power: "P".into(),
            volume_up: "Up".into(),
            volume_down: "Down".into(),
            record: "R".into(),
            mute: "M".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LanguageConfig
// ---------------------------------------------------------------------------

/// Language pair selected at startup.  Names or codes from the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    pub first: Option<String>,
    pub second: Option<String>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use appliance_controller::config::{AppConfig, AppPaths};
///
/// // Returns Default when the file is missing.
/// let config = AppConfig::load_from(&AppPaths::new().settings_file).unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gpio: GpioConfig,
    pub audio: AudioConfig,
    pub timing: TimingConfig,
    pub keyboard: KeyboardConfig,
    pub languages: LanguageConfig,
}

impl AppConfig {
    /// Load from `path`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let levels = &self.audio.volume_levels;
        ensure!(!levels.is_empty(), "audio.volume_levels must not be empty");
        ensure!(
            levels.windows(2).all(|w| w[0] < w[1]),
            "audio.volume_levels must be strictly ascending, got {levels:?}"
        );
        ensure!(
            levels.iter().all(|&p| p <= 100),
            "audio.volume_levels are percentages (0-100), got {levels:?}"
        );
        ensure!(
            self.audio.initial_volume_index < levels.len(),
            "audio.initial_volume_index {} is out of range for {} levels",
            self.audio.initial_volume_index,
            levels.len()
        );
        let recording = self.audio.recording_path();
        ensure!(
            recording.to_str().is_some(),
            "audio.recording_file must be valid UTF-8, got {}",
            recording.display()
        );
        ensure!(self.timing.blink_interval_ms > 0, "timing.blink_interval_ms must be > 0");
        ensure!(self.gpio.poll_interval_ms > 0, "gpio.poll_interval_ms must be > 0");

        let g = &self.gpio;
        let mut lines = vec![
            g.power_button,
            g.volume_up_button,
            g.volume_down_button,
            g.record_button,
            g.mute_button,
            g.power_led,
            g.mute_led,
            g.record_led,
        ];
        lines.sort_unstable();
        lines.dedup();
        ensure!(lines.len() == 8, "gpio lines must be distinct");

        let langs = &self.languages;
        ensure!(
            langs.first.is_some() == langs.second.is_some(),
            "languages.first and languages.second must be set together"
        );
        for name in [&langs.first, &langs.second].into_iter().flatten() {
            ensure!(
                crate::languages::lookup(name).is_some(),
                "unknown language `{name}`"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
