//! Keyboard bench backend: global key presses stand in for the buttons.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread and
//! has **no graceful shutdown API**.  [`KeyboardPins::release`] therefore
//! drops every stream sender and sets a stop flag; the listener thread stays
//! parked in rdev until the process exits but forwards nothing.
//!
//! Key auto-repeat is absorbed by the same [`Debouncer`] the GPIO backend
//! uses, so holding a key behaves like holding a button.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::KeyboardConfig;

use super::{Button, ButtonPress, Debouncer, GpioError, PinEventSource};

struct Route {
    tx: mpsc::Sender<ButtonPress>,
    debouncer: Debouncer,
}

type Routes = Arc<Mutex<HashMap<Button, Route>>>;

// ---------------------------------------------------------------------------
// KeyboardPins
// ---------------------------------------------------------------------------

/// Maps configured keys to buttons.
///
/// ```no_run
/// use std::time::Duration;
/// use appliance_controller::config::KeyboardConfig;
/// use appliance_controller::gpio::{Button, KeyboardPins, PinEventSource};
///
/// let mut pins = KeyboardPins::from_config(&KeyboardConfig::default()).unwrap();
/// let presses = pins.register(Button::Power, Duration::from_millis(300)).unwrap();
/// // press `P` ...
/// let _ = presses.recv();
/// ```
pub struct KeyboardPins {
    /// `rdev::Key` is not `Hash`, so bindings are a short list.
    bindings: Vec<(rdev::Key, Button)>,
    routes: Routes,
    stop: Arc<AtomicBool>,
    /// Never joined: `rdev::listen` does not return.
    listener: Option<std::thread::JoinHandle<()>>,
}

impl KeyboardPins {
    pub fn from_config(cfg: &KeyboardConfig) -> Result<Self, GpioError> {
        let pairs = [
            (&cfg.power, Button::Power),
            (&cfg.volume_up, Button::VolumeUp),
            (&cfg.volume_down, Button::VolumeDown),
            (&cfg.record, Button::Record),
            (&cfg.mute, Button::Mute),
        ];
        let mut bindings = Vec::with_capacity(pairs.len());
        for (name, button) in pairs {
            let key = parse_key(name).ok_or_else(|| GpioError::UnknownKey(name.clone()))?;
            bindings.push((key, button));
        }
        Ok(Self {
            bindings,
            routes: Arc::new(Mutex::new(HashMap::new())),
            stop: Arc::new(AtomicBool::new(false)),
            listener: None,
        })
    }

    fn ensure_listener(&mut self) -> Result<(), GpioError> {
        if self.listener.is_some() {
            return Ok(());
        }
        let bindings = self.bindings.clone();
        let routes = Arc::clone(&self.routes);
        let stop = Arc::clone(&self.stop);

        let handle = std::thread::Builder::new()
            .name("keyboard-pins".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    if let rdev::EventType::KeyPress(key) = event.event_type {
                        forward_key(&bindings, &routes, key, Instant::now());
                    }
                });
                if let Err(e) = result {
                    log::error!("gpio: keyboard listener exited: {e:?}");
                }
            })
            .map_err(|source| GpioError::Io { line: 0, source })?;

        log::info!("gpio: keyboard backend active");
        self.listener = Some(handle);
        Ok(())
    }
}

impl PinEventSource for KeyboardPins {
    fn register(
        &mut self,
        button: Button,
        debounce: Duration,
    ) -> Result<mpsc::Receiver<ButtonPress>, GpioError> {
        if self.stop.load(Ordering::SeqCst) {
            return Err(GpioError::Released);
        }
        let (tx, rx) = mpsc::channel();
        {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            if routes.contains_key(&button) {
                return Err(GpioError::AlreadyRegistered(button));
            }
            routes.insert(
                button,
                Route {
                    tx,
                    debouncer: Debouncer::new(debounce),
                },
            );
        }
        self.ensure_listener()?;
        Ok(rx)
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Route one key press to its button stream, if bound and not a bounce.
fn forward_key(bindings: &[(rdev::Key, Button)], routes: &Routes, key: rdev::Key, now: Instant) {
    let Some(&(_, button)) = bindings.iter().find(|(k, _)| *k == key) else {
        return;
    };
    let mut routes = routes.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(route) = routes.get_mut(&button) {
        if route.debouncer.accept(now) {
            let _ = route.tx.send(ButtonPress { button, at: now });
        }
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name from the config file into an [`rdev::Key`].
///
/// Accepts F1–F12, digits, single ASCII letters (either case), arrows and a
/// handful of named keys.  Returns `None` for anything else.
///
/// ```
/// use appliance_controller::gpio::parse_key;
///
/// assert_eq!(parse_key("P"), Some(rdev::Key::KeyP));
/// assert_eq!(parse_key("up"), Some(rdev::Key::UpArrow));
/// assert_eq!(parse_key("F4"), Some(rdev::Key::F4));
/// assert_eq!(parse_key("Ctrl+P"), None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;

    const LETTERS: [rdev::Key; 26] = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN, KeyO,
        KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ];
    const DIGITS: [rdev::Key; 10] = [Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9];
    const FUNCTION: [rdev::Key; 12] = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(LETTERS[(c.to_ascii_lowercase() as u8 - b'a') as usize]);
        }
        if let Some(d) = c.to_digit(10) {
            return Some(DIGITS[d as usize]);
        }
        return None;
    }

    if let Some(n) = name
        .strip_prefix(|c: char| c == 'F' || c == 'f')
        .and_then(|n| n.parse::<usize>().ok())
    {
        return (1..=12).contains(&n).then(|| FUNCTION[n - 1]);
    }

    match name.to_ascii_lowercase().as_str() {
        "up" | "uparrow" => Some(UpArrow),
        "down" | "downarrow" => Some(DownArrow),
        "left" | "leftarrow" => Some(LeftArrow),
        "right" | "rightarrow" => Some(RightArrow),
        "space" => Some(Space),
        "enter" | "return" => Some(Return),
        "escape" | "esc" => Some(Escape),
        "tab" => Some(Tab),
        "backspace" => Some(Backspace),
        "pageup" => Some(PageUp),
        "pagedown" => Some(PageDown),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_letters_digits_and_function_keys() {
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("Z"), Some(rdev::Key::KeyZ));
        assert_eq!(parse_key("7"), Some(rdev::Key::Num7));
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("f12"), Some(rdev::Key::F12));
        assert_eq!(parse_key("F13"), None);
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Down"), Some(rdev::Key::DownArrow));
        assert_eq!(parse_key("Esc"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("é"), None);
        assert_eq!(parse_key("Fn"), None);
    }

    #[test]
    fn unknown_binding_is_rejected() {
        let cfg = KeyboardConfig {
            mute: "Hyper".into(),
            ..KeyboardConfig::default()
        };
        assert!(matches!(
            KeyboardPins::from_config(&cfg),
            Err(GpioError::UnknownKey(k)) if k == "Hyper"
        ));
    }

    #[test]
    fn key_presses_are_routed_and_debounced() {
        let pins = KeyboardPins::from_config(&KeyboardConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel();
        pins.routes.lock().unwrap().insert(
            Button::Record,
            Route {
                tx,
                debouncer: Debouncer::new(Duration::from_millis(300)),
            },
        );

        let t0 = Instant::now();
        forward_key(&pins.bindings, &pins.routes, rdev::Key::KeyR, t0);
        // auto-repeat
        forward_key(&pins.bindings, &pins.routes, rdev::Key::KeyR, t0 + Duration::from_millis(30));
        // unbound key
        forward_key(&pins.bindings, &pins.routes, rdev::Key::KeyQ, t0);
        // bound, but nobody registered for it
        forward_key(&pins.bindings, &pins.routes, rdev::Key::KeyM, t0);
        forward_key(&pins.bindings, &pins.routes, rdev::Key::KeyR, t0 + Duration::from_millis(400));

        let presses: Vec<_> = rx.try_iter().collect();
        assert_eq!(presses.len(), 2);
        assert!(presses.iter().all(|p| p.button == Button::Record));
    }

    #[test]
    fn release_closes_streams() {
        let mut pins = KeyboardPins::from_config(&KeyboardConfig::default()).unwrap();
        let (tx, rx) = mpsc::channel();
        pins.routes.lock().unwrap().insert(
            Button::Power,
            Route {
                tx,
                debouncer: Debouncer::new(Duration::ZERO),
            },
        );

        pins.release();

        assert!(matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected)));
        assert!(matches!(
            pins.register(Button::Power, Duration::ZERO),
            Err(GpioError::Released)
        ));
    }
}
