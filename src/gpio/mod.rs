//! Buttons and indicator lights.
//!
//! The controller never touches pins directly.  It sees two capabilities:
//!
//! * [`PinEventSource`]: `register(button, debounce)` hands back a stream
//!   (an `mpsc::Receiver`) of debounced falling-edge presses for that button.
//! * [`IndicatorOutputs`]: idempotent `set(indicator, level)` writes.
//!
//! # Backends
//!
//! ```text
//!                 ┌──────────────┐        ┌────────────────────┐
//! /sys/class/gpio │ SysfsInputs  │        │ SysfsIndicators    │ value files
//!   (appliance)   │ poll thread  │        │                    │
//!                 │ per line     │        └────────────────────┘
//!                 └──────┬───────┘
//!                        │ ButtonPress (mpsc, one stream per button)
//!                 ┌──────┴───────┐        ┌────────────────────┐
//!   keyboard      │ KeyboardPins │        │ LoggedIndicators   │ log + memory
//!   (bench)       │ rdev thread  │        │                    │
//!                 └──────────────┘        └────────────────────┘
//! ```

pub mod keyboard;
pub mod logged;
pub mod sysfs;

#[cfg(test)]
pub mod testing;

pub use keyboard::{parse_key, KeyboardPins};
pub use logged::LoggedIndicators;
pub use sysfs::{SysfsIndicators, SysfsInputs};

use std::sync::mpsc;
use std::time::{Duration, Instant};

use thiserror::Error;

// ---------------------------------------------------------------------------
// Button / Indicator / Level
// ---------------------------------------------------------------------------

/// The five physical buttons on the front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Power,
    VolumeUp,
    VolumeDown,
    Record,
    Mute,
}

impl Button {
    pub const ALL: [Button; 5] = [
        Button::Power,
        Button::VolumeUp,
        Button::VolumeDown,
        Button::Record,
        Button::Mute,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Button::Power => "power",
            Button::VolumeUp => "volume-up",
            Button::VolumeDown => "volume-down",
            Button::Record => "record",
            Button::Mute => "mute",
        }
    }
}

/// The three indicator lights.  All are active-high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Power,
    Mute,
    Record,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [Indicator::Power, Indicator::Mute, Indicator::Record];

    pub fn label(&self) -> &'static str {
        match self {
            Indicator::Power => "power",
            Indicator::Mute => "mute",
            Indicator::Record => "record",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Indicator::Power => 0,
            Indicator::Mute => 1,
            Indicator::Record => 2,
        }
    }
}

/// Logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    pub fn from_bool(on: bool) -> Self {
        if on {
            Level::High
        } else {
            Level::Low
        }
    }

    pub fn is_high(&self) -> bool {
        *self == Level::High
    }
}

/// One accepted (debounced) press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub button: Button,
    pub at: Instant,
}

// ---------------------------------------------------------------------------
// GpioError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GpioError {
    /// Reading or writing a sysfs file for `line` failed.
    #[error("gpio line {line}: {source}")]
    Io {
        line: u32,
        #[source]
        source: std::io::Error,
    },

    /// The value file contained something other than `0` or `1`.
    #[error("gpio line {line}: unexpected value {value:?}")]
    BadValue { line: u32, value: String },

    #[error("{} button is already registered", .0.label())]
    AlreadyRegistered(Button),

    #[error("unknown key name `{0}`")]
    UnknownKey(String),

    #[error("the pin source has been released")]
    Released,
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Source of debounced falling-edge presses.
///
/// Each registered button gets its own stream.  Streams end (the receiver
/// yields `Err`/`None`) once [`release`](Self::release) has been called.
pub trait PinEventSource: Send {
    fn register(
        &mut self,
        button: Button,
        debounce: Duration,
    ) -> Result<mpsc::Receiver<ButtonPress>, GpioError>;

    /// Stop delivering presses and give the lines back to the system.
    fn release(&mut self);
}

/// Writes to the indicator lights.
///
/// Setting a line to the level it already has is harmless.
pub trait IndicatorOutputs: Send + Sync {
    fn set(&self, indicator: Indicator, level: Level) -> Result<(), GpioError>;

    /// Drive every indicator low.  Attempts all three even if one fails and
    /// returns the first error.
    fn all_off(&self) -> Result<(), GpioError> {
        let mut first_err = None;
        for indicator in Indicator::ALL {
            if let Err(e) = self.set(indicator, Level::Low) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Give the output lines back to the system.
    fn release(&self) {}
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Per-line debounce: an edge is accepted only if `window` has elapsed since
/// the previously *accepted* edge.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(prev) if now.saturating_duration_since(prev) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
