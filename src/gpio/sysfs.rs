//! Linux sysfs GPIO backend (`/sys/class/gpio`).
//!
//! Inputs are sampled by one thread per line; a high→low transition that
//! passes the [`Debouncer`] becomes a [`ButtonPress`].  Buttons idle high
//! (pull-up) and pull the line low when pressed.
//!
//! Outputs are exported with direction `low`, which the kernel treats as
//! "output, initially low", so lights never flash on during startup.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::GpioConfig;

use super::{
    Button, ButtonPress, Debouncer, GpioError, Indicator, IndicatorOutputs, Level, PinEventSource,
};

// ---------------------------------------------------------------------------
// SysfsLine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SysfsLine {
    root: PathBuf,
    line: u32,
}

impl SysfsLine {
    fn new(root: &Path, line: u32) -> Self {
        Self {
            root: root.to_path_buf(),
            line,
        }
    }

    fn dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.line))
    }

    fn io_err(&self, source: std::io::Error) -> GpioError {
        GpioError::Io {
            line: self.line,
            source,
        }
    }

    /// Export the line (if the kernel has not already) and set its direction.
    fn export(&self, direction: &str) -> Result<(), GpioError> {
        if !self.dir().exists() {
            std::fs::write(self.root.join("export"), self.line.to_string())
                .map_err(|e| self.io_err(e))?;
        }
        std::fs::write(self.dir().join("direction"), direction).map_err(|e| self.io_err(e))
    }

    fn unexport(&self) {
        if let Err(e) = std::fs::write(self.root.join("unexport"), self.line.to_string()) {
            log::debug!("gpio: unexport of line {} failed: {e}", self.line);
        }
    }

    fn read(&self) -> Result<Level, GpioError> {
        let raw = std::fs::read_to_string(self.dir().join("value")).map_err(|e| self.io_err(e))?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(GpioError::BadValue {
                line: self.line,
                value: other.to_string(),
            }),
        }
    }

    fn write(&self, level: Level) -> Result<(), GpioError> {
        let value = if level.is_high() { "1" } else { "0" };
        std::fs::write(self.dir().join("value"), value).map_err(|e| self.io_err(e))
    }
}

// ---------------------------------------------------------------------------
// SysfsInputs
// ---------------------------------------------------------------------------

/// Button inputs read from sysfs value files.
pub struct SysfsInputs {
    root: PathBuf,
    poll_interval: Duration,
    lines: HashMap<Button, u32>,
    registered: HashSet<Button>,
    stop: Arc<AtomicBool>,
    workers: Vec<(SysfsLine, JoinHandle<()>)>,
}

impl SysfsInputs {
    pub fn new(cfg: &GpioConfig) -> Self {
        let lines = HashMap::from([
            (Button::Power, cfg.power_button),
            (Button::VolumeUp, cfg.volume_up_button),
            (Button::VolumeDown, cfg.volume_down_button),
            (Button::Record, cfg.record_button),
            (Button::Mute, cfg.mute_button),
        ]);
        Self {
            root: cfg.sysfs_root.clone(),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            lines,
            registered: HashSet::new(),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }
}

impl PinEventSource for SysfsInputs {
    fn register(
        &mut self,
        button: Button,
        debounce: Duration,
    ) -> Result<mpsc::Receiver<ButtonPress>, GpioError> {
        if self.stop.load(Ordering::SeqCst) {
            return Err(GpioError::Released);
        }
        if !self.registered.insert(button) {
            return Err(GpioError::AlreadyRegistered(button));
        }

        let line = SysfsLine::new(&self.root, self.lines[&button]);
        if let Err(e) = line.export("in") {
            self.registered.remove(&button);
            return Err(e);
        }

        let (tx, rx) = mpsc::channel();
        let stop = Arc::clone(&self.stop);
        let poll = self.poll_interval;
        let worker_line = line.clone();

        let handle = std::thread::Builder::new()
            .name(format!("gpio-{}", button.label()))
            .spawn(move || poll_line(worker_line, button, debounce, poll, stop, tx))
            .map_err(|e| line.io_err(e))?;

        log::debug!(
            "gpio: watching line {} for {} presses (debounce {:?})",
            line.line,
            button.label(),
            debounce
        );
        self.workers.push((line, handle));
        Ok(rx)
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for (line, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("gpio: poll thread for line {} panicked", line.line);
            }
            line.unexport();
        }
    }
}

impl Drop for SysfsInputs {
    fn drop(&mut self) {
        self.release();
    }
}

/// Body of one input poll thread.  Exits when `stop` is set or the
/// receiving end of `tx` is gone.
fn poll_line(
    line: SysfsLine,
    button: Button,
    debounce: Duration,
    poll: Duration,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<ButtonPress>,
) {
    let mut debouncer = Debouncer::new(debounce);
    let mut previous = line.read().unwrap_or(Level::High);
    let mut read_failing = false;

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(poll);

        let current = match line.read() {
            Ok(level) => {
                read_failing = false;
                level
            }
            Err(e) => {
                if !read_failing {
                    log::warn!("gpio: {e}");
                    read_failing = true;
                }
                continue;
            }
        };

        if previous.is_high() && !current.is_high() {
            let now = Instant::now();
            if debouncer.accept(now) {
                if tx.send(ButtonPress { button, at: now }).is_err() {
                    break;
                }
            } else {
                log::trace!("gpio: bounce on line {} ignored", line.line);
            }
        }
        previous = current;
    }
}

// ---------------------------------------------------------------------------
// SysfsIndicators
// ---------------------------------------------------------------------------

/// Indicator lights driven through sysfs value files.
pub struct SysfsIndicators {
    /// Indexed by `Indicator::index`.
    lines: [SysfsLine; 3],
}

impl SysfsIndicators {
    /// Export the three output lines, all initially low.
    pub fn open(cfg: &GpioConfig) -> Result<Self, GpioError> {
        let root = &cfg.sysfs_root;
        let lines = [
            SysfsLine::new(root, cfg.power_led),
            SysfsLine::new(root, cfg.mute_led),
            SysfsLine::new(root, cfg.record_led),
        ];
        for line in &lines {
            line.export("low")?;
        }
        Ok(Self { lines })
    }
}

impl IndicatorOutputs for SysfsIndicators {
    fn set(&self, indicator: Indicator, level: Level) -> Result<(), GpioError> {
        self.lines[indicator.index()].write(level)
    }

    fn release(&self) {
        for line in &self.lines {
            line.unexport();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
