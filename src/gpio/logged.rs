//! In-memory indicator outputs that log every change.
//!
//! Used by the keyboard bench backend, where there are no lights to drive,
//! and by tests, which inspect [`LoggedIndicators::level`] and
//! [`LoggedIndicators::history`].

use std::sync::{Mutex, MutexGuard};

use super::{GpioError, Indicator, IndicatorOutputs, Level};

#[derive(Debug, Default)]
pub struct LoggedIndicators {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    levels: [Level; 3],
    /// Every write, including ones that did not change the level.
    history: Vec<(Indicator, Level)>,
}

impl LoggedIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, indicator: Indicator) -> Level {
        self.lock().levels[indicator.index()]
    }

    pub fn history(&self) -> Vec<(Indicator, Level)> {
        self.lock().history.clone()
    }

    /// Writes to `indicator` recorded so far.
    pub fn writes_to(&self, indicator: Indicator) -> Vec<Level> {
        self.lock()
            .history
            .iter()
            .filter(|(i, _)| *i == indicator)
            .map(|(_, l)| *l)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IndicatorOutputs for LoggedIndicators {
    fn set(&self, indicator: Indicator, level: Level) -> Result<(), GpioError> {
        let mut inner = self.lock();
        let slot = &mut inner.levels[indicator.index()];
        if *slot != level {
            log::info!("indicator: {} -> {:?}", indicator.label(), level);
        }
        *slot = level;
        inner.history.push((indicator, level));
        Ok(())
    }
}
