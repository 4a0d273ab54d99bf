//! Configuration module for the appliance controller.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for platform directories, and TOML persistence via
//! `AppConfig::load_from` / `AppConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, BackendKind, GpioConfig, KeyboardConfig, LanguageConfig, TimingConfig,
};
