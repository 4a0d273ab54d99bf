//! Device state: the single source of truth for power, mute, recording,
//! volume and the selected language pair.
//!
//! [`LiveState`] lives inside the controller's mutex and is never handed
//! out.  Callers get a [`DeviceState`] copy from `Controller::snapshot`.
//!
//! The one exception to "only touched under the lock" is the recording flag:
//! writes happen under the lock, but the blink worker reads it through a
//! [`RecordingFlag`] clone without locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::languages;

// ---------------------------------------------------------------------------
// DeviceState (snapshot)
// ---------------------------------------------------------------------------

/// Point-in-time copy of the device state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub powered: bool,
    pub muted: bool,
    pub recording: bool,
    pub volume_index: usize,
    pub volume_percent: u8,
    pub language_pair: (String, String),
}

// ---------------------------------------------------------------------------
// RecordingFlag
// ---------------------------------------------------------------------------

/// Shared "recording in progress" flag.
///
/// Readers only need eventual visibility (within one blink interval), so
/// plain acquire/release ordering is enough.
#[derive(Debug, Clone, Default)]
pub struct RecordingFlag(Arc<AtomicBool>);

impl RecordingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, value: bool) {
        self.0.store(value, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// VolumeLevels
// ---------------------------------------------------------------------------

/// A fixed ascending table of gain percentages and a cursor into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLevels {
    levels: Vec<u8>,
    index: usize,
}

impl VolumeLevels {
    /// `index` is clamped into range.  An empty table is treated as `[0]`.
    pub fn new(levels: Vec<u8>, index: usize) -> Self {
        let levels = if levels.is_empty() { vec![0] } else { levels };
        let index = index.min(levels.len() - 1);
        Self { levels, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn max_index(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn percent(&self) -> u8 {
        self.levels[self.index]
    }

    /// Move one step up.  Returns the new percentage, or `None` at the top.
    pub fn step_up(&mut self) -> Option<u8> {
        if self.index >= self.max_index() {
            return None;
        }
        self.index += 1;
        Some(self.percent())
    }

    /// Move one step down.  Returns the new percentage, or `None` at zero.
    pub fn step_down(&mut self) -> Option<u8> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.percent())
    }

    pub fn bar(&self) -> String {
        volume_bar(self.index, self.max_index())
    }
}

/// `###--` style gauge: one `#` per step above the bottom, `-` for the rest.
pub fn volume_bar(index: usize, max_index: usize) -> String {
    let filled = index.min(max_index);
    let mut bar = "#".repeat(filled);
    bar.push_str(&"-".repeat(max_index - filled));
    bar
}

// ---------------------------------------------------------------------------
// LiveState
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct LiveState {
    pub powered: bool,
    pub muted: bool,
    pub recording: RecordingFlag,
    pub volume: VolumeLevels,
    pub language_pair: (String, String),
}

impl LiveState {
    pub fn new(volume: VolumeLevels) -> Self {
        Self {
            powered: false,
            muted: false,
            recording: RecordingFlag::new(),
            volume,
            language_pair: (languages::UNSET.to_string(), languages::UNSET.to_string()),
        }
    }

    pub fn snapshot(&self) -> DeviceState {
        DeviceState {
            powered: self.powered,
            muted: self.muted,
            recording: self.recording.get(),
            volume_index: self.volume.index(),
            volume_percent: self.volume.percent(),
            language_pair: self.language_pair.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn default_levels() -> VolumeLevels {
        VolumeLevels::new(vec![0, 20, 40, 60, 80, 100], 2)
    }

    #[test]
    fn steps_stop_at_both_ends() {
        let mut v = default_levels();
        assert_eq!(v.percent(), 40);

        assert_eq!(v.step_up(), Some(60));
        assert_eq!(v.step_up(), Some(80));
        assert_eq!(v.step_up(), Some(100));
        assert_eq!(v.step_up(), None);
        assert_eq!(v.index(), 5);

        for _ in 0..10 {
            v.step_down();
        }
        assert_eq!(v.index(), 0);
        assert_eq!(v.step_down(), None);
        assert_eq!(v.percent(), 0);
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        let v = VolumeLevels::new(vec![10, 20], 9);
        assert_eq!(v.index(), 1);

        let v = VolumeLevels::new(Vec::new(), 3);
        assert_eq!(v.index(), 0);
        assert_eq!(v.max_index(), 0);
    }

    #[test]
    fn bar_matches_level() {
        let mut v = default_levels();
        assert_eq!(v.bar(), "##---");
        v.step_up();
        assert_eq!(v.bar(), "###--");
        assert_eq!(VolumeLevels::new(vec![0, 50, 100], 0).bar(), "--");
        assert_eq!(volume_bar(9, 3), "###");
    }

    #[test]
    fn fresh_state_is_off_and_unset() {
        let state = LiveState::new(default_levels()).snapshot();
        assert!(!state.powered);
        assert!(!state.muted);
        assert!(!state.recording);
        assert_eq!(state.volume_index, 2);
        assert_eq!(state.volume_percent, 40);
        assert_eq!(state.language_pair.0, languages::UNSET);
    }

    #[test]
    fn recording_flag_clones_share_value() {
        let flag = RecordingFlag::new();
        let reader = flag.clone();
        flag.set(true);
        assert!(reader.get());
        flag.set(false);
        assert!(!reader.get());
    }
}
