//! Front-panel controller for a recording and translation appliance.
//!
//! Five buttons (power, volume up/down, mute, record) and three lights
//! (power, mute, record) drive the ALSA command-line tools: a live
//! microphone-to-speaker passthrough while powered, capture-to-file on
//! demand, and capture gain/mute through the mixer.

pub mod audio;
pub mod config;
pub mod controller;
pub mod gpio;
pub mod languages;
pub mod lifecycle;
pub mod process;
