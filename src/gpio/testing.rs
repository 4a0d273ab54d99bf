//! Test double for [`PinEventSource`]: presses are injected by the test.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use super::{Button, ButtonPress, GpioError, PinEventSource};

/// Clones share state, so a test keeps one clone to press buttons after
/// handing the other to the code under test.
#[derive(Clone, Default)]
pub struct ScriptedPins {
    routes: Arc<Mutex<HashMap<Button, mpsc::Sender<ButtonPress>>>>,
    released: Arc<AtomicBool>,
}

impl ScriptedPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one press.  Returns `false` if nobody registered the button
    /// or the source was released.
    pub fn press(&self, button: Button) -> bool {
        let routes = self.routes.lock().unwrap();
        routes.get(&button).is_some_and(|tx| {
            tx.send(ButtonPress {
                button,
                at: Instant::now(),
            })
            .is_ok()
        })
    }

    pub fn registered(&self) -> usize {
        self.routes.lock().unwrap().len()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl PinEventSource for ScriptedPins {
    fn register(
        &mut self,
        button: Button,
        _debounce: Duration,
    ) -> Result<mpsc::Receiver<ButtonPress>, GpioError> {
        let mut routes = self.routes.lock().unwrap();
        if routes.contains_key(&button) {
            return Err(GpioError::AlreadyRegistered(button));
        }
        let (tx, rx) = mpsc::channel();
        routes.insert(button, tx);
        Ok(rx)
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
        self.routes.lock().unwrap().clear();
    }
}
