//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line and load [`AppConfig`] (defaults on first run).
//! 3. Apply command-line overrides and validate.
//! 4. Open the pin backend selected in config (sysfs GPIO or keyboard bench).
//! 5. Build the controller and apply the configured language pair.
//! 6. Create a current-thread tokio runtime, hook SIGINT/SIGTERM to
//!    [`Shutdown`], and run the [`Lifecycle`] until power-off or a signal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use appliance_controller::{
    audio::AmixerMixer,
    config::{AppConfig, AppPaths, BackendKind},
    controller::{Controller, ControllerSettings},
    gpio::{
        IndicatorOutputs, KeyboardPins, LoggedIndicators, PinEventSource, SysfsIndicators,
        SysfsInputs,
    },
    lifecycle::{Lifecycle, Shutdown},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pin backend: `sysfs` on the device, `keyboard` on a workstation
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Language pair as `first,second`, by name or code (e.g. `fr,en`)
    #[arg(short, long)]
    languages: Option<String>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration
    let args = Args::parse();
    let settings_file = args
        .config
        .clone()
        .unwrap_or_else(|| AppPaths::new().settings_file);
    let mut config = AppConfig::load_from(&settings_file)
        .with_context(|| format!("reading {}", settings_file.display()))?;

    // 3. Overrides
    if let Some(backend) = args.backend {
        config.gpio.backend = backend;
    }
    if let Some(pair) = &args.languages {
        let Some((first, second)) = pair.split_once(',') else {
            bail!("--languages expects `first,second`, got `{pair}`");
        };
        config.languages.first = Some(first.trim().to_string());
        config.languages.second = Some(second.trim().to_string());
    }
    config.validate().context("invalid settings")?;

    if args.write_config {
        config.save_to(&settings_file)?;
        log::info!("settings written to {}", settings_file.display());
        return Ok(());
    }

    log::info!("appliance controller starting ({:?} backend)", config.gpio.backend);

    // Runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    rt.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<()> {
    let shutdown = Shutdown::new();

    // 4. Pin backend
    let (pins, outputs): (Box<dyn PinEventSource>, Arc<dyn IndicatorOutputs>) =
        match config.gpio.backend {
            BackendKind::Sysfs => {
                let outputs: Arc<dyn IndicatorOutputs> = Arc::new(
                    SysfsIndicators::open(&config.gpio).context("exporting indicator lines")?,
                );
                let pins: Box<dyn PinEventSource> = Box::new(SysfsInputs::new(&config.gpio));
                (pins, outputs)
            }
            BackendKind::Keyboard => {
                let pins: Box<dyn PinEventSource> = Box::new(
                    KeyboardPins::from_config(&config.keyboard).context("keyboard bindings")?,
                );
                log::info!(
                    "keys: power={} vol+={} vol-={} record={} mute={}",
                    config.keyboard.power,
                    config.keyboard.volume_up,
                    config.keyboard.volume_down,
                    config.keyboard.record,
                    config.keyboard.mute
                );
                let outputs: Arc<dyn IndicatorOutputs> = Arc::new(LoggedIndicators::new());
                (pins, outputs)
            }
        };

    // 5. Controller
    let controller = Arc::new(Controller::new(
        ControllerSettings::from_config(&config),
        Arc::clone(&outputs),
        Arc::new(AmixerMixer::from_config(&config.audio)),
        shutdown.clone(),
    ));
    if let (Some(first), Some(second)) = (&config.languages.first, &config.languages.second) {
        controller.select_languages(first, second)?;
    }

    // 6. Signals
    tokio::spawn(forward_signals(shutdown.clone()));

    Lifecycle::new(
        controller,
        pins,
        outputs,
        shutdown,
        Duration::from_millis(config.gpio.debounce_ms),
    )
    .run()
    .await
}

/// Turn SIGINT (Ctrl-C) or SIGTERM into a shutdown request.
async fn forward_signals(shutdown: Shutdown) {
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                log::warn!("SIGTERM handler unavailable: {e}");
                if tokio::signal::ctrl_c().await.is_ok() {
                    shutdown.request();
                }
                return;
            }
        };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::warn!("Ctrl-C handler unavailable: {e}");
                terminate.recv().await;
            }
        }
        _ = terminate.recv() => {}
    }
    log::info!("signal received");
    shutdown.request();
}
