//! Record indicator blinker.
//!
//! Runs on its own thread for one recording session.  It polls the shared
//! [`RecordingFlag`] after every half period and exits within one interval of
//! the flag clearing.  There is no separate cancel call: clearing the flag is
//! the cancellation.
//!
//! Whatever way the loop ends, including a panic in an output write, the
//! indicator is driven low before the thread finishes.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::gpio::{Indicator, IndicatorOutputs, Level};

use super::state::RecordingFlag;

pub struct BlinkWorker {
    handle: JoinHandle<()>,
}

impl BlinkWorker {
    pub fn spawn(
        flag: RecordingFlag,
        outputs: Arc<dyn IndicatorOutputs>,
        indicator: Indicator,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let handle = std::thread::Builder::new()
            .name("record-blink".into())
            .spawn(move || blink(&flag, outputs, indicator, interval))?;
        Ok(Self { handle })
    }

    /// Wait for the loop to notice the cleared flag and exit.
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("blink: worker panicked");
        }
    }
}

/// Forces the indicator low when dropped.
struct ForceLow {
    outputs: Arc<dyn IndicatorOutputs>,
    indicator: Indicator,
}

impl Drop for ForceLow {
    fn drop(&mut self) {
        if let Err(e) = self.outputs.set(self.indicator, Level::Low) {
            log::warn!("blink: could not clear {} indicator: {e}", self.indicator.label());
        }
    }
}

fn blink(
    flag: &RecordingFlag,
    outputs: Arc<dyn IndicatorOutputs>,
    indicator: Indicator,
    interval: Duration,
) {
    let guard = ForceLow { outputs, indicator };

    while flag.get() {
        write(&guard, Level::High);
        std::thread::sleep(interval);
        if !flag.get() {
            break;
        }
        write(&guard, Level::Low);
        std::thread::sleep(interval);
    }
}

fn write(guard: &ForceLow, level: Level) {
    if let Err(e) = guard.outputs.set(guard.indicator, level) {
        log::warn!("blink: {e}");
    }
}
