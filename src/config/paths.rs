//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Linux:   ~/.config/appliance-controller/
//!   macOS:   ~/Library/Application Support/appliance-controller/
//!
//! Data dir (recorded artifact):
//!   Linux:   ~/.local/share/appliance-controller/
//!   macOS:   ~/Library/Application Support/appliance-controller/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for the recording file.
    pub data_dir: PathBuf,
    /// Default location of the single recorded artifact.
    pub recording_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "appliance-controller";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory when the platform has no standard
    /// location (e.g. a service account without `$HOME`).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            recording_file: data_dir.join("recording.wav"),
            config_dir,
            data_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
