use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::matcher::ShortcutMatcher;
use crate::config::{Chord, ShortcutAction};

/// A raw key transition delivered by the OS hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(u32),
    Released(u32),
}

impl FromStr for KeyEvent {
    type Err = String;

    /// Parse `"down <code>"` or `"up <code>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(kind), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("Invalid key event '{}'", s.trim()));
        };
        let code = code
            .parse::<u32>()
            .map_err(|_| format!("Invalid key code '{}'", code))?;

        match kind {
            "down" | "press" => Ok(KeyEvent::Pressed(code)),
            "up" | "release" => Ok(KeyEvent::Released(code)),
            other => Err(format!("Unknown key event kind '{}'", other)),
        }
    }
}

/// Callback invoked for every matched action.
pub type Dispatch = Arc<dyn Fn(ShortcutAction) + Send + Sync>;

/// Runs a [`ShortcutMatcher`] on its own thread.
///
/// Each event is applied to the matcher under a lock, so updates and chord
/// evaluation never interleave with a concurrent reload. The dispatch callback
/// runs after the lock is released.
pub struct ShortcutListener {
    sender: Sender<KeyEvent>,
    matcher: Arc<Mutex<ShortcutMatcher>>,
    handle: JoinHandle<()>,
}

impl ShortcutListener {
    /// Start the listener thread.
    pub fn spawn(matcher: ShortcutMatcher, dispatch: Dispatch) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let matcher = Arc::new(Mutex::new(matcher));
        let thread_matcher = Arc::clone(&matcher);

        let handle = thread::Builder::new()
            .name("snapship-shortcuts".to_string())
            .spawn(move || run(receiver, thread_matcher, dispatch))?;

        Ok(Self {
            sender,
            matcher,
            handle,
        })
    }

    /// Sender for feeding key events from the hook.
    pub fn sender(&self) -> Sender<KeyEvent> {
        self.sender.clone()
    }

    /// Replace the configured chords. Held keys are forgotten.
    pub fn reload(&self, chords: Vec<Chord>) -> Result<(), String> {
        let replacement = ShortcutMatcher::new(chords)?;
        match self.matcher.lock() {
            Ok(mut guard) => *guard = replacement,
            Err(poisoned) => *poisoned.into_inner() = replacement,
        }
        log::info!("Reloaded shortcut chords");
        Ok(())
    }

    /// Stop the thread once every outstanding sender is dropped.
    pub fn shutdown(self) {
        let Self { sender, handle, .. } = self;
        drop(sender);
        if handle.join().is_err() {
            log::warn!("Shortcut listener thread panicked");
        }
    }
}

fn run(receiver: Receiver<KeyEvent>, matcher: Arc<Mutex<ShortcutMatcher>>, dispatch: Dispatch) {
    log::debug!("Shortcut listener started");

    for event in receiver {
        let action = {
            let mut matcher = match matcher.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match event {
                KeyEvent::Pressed(code) => matcher.key_down(code),
                KeyEvent::Released(code) => {
                    matcher.key_up(code);
                    None
                }
            }
        };

        if let Some(action) = action {
            log::info!("Shortcut triggered: {:?}", action);
            dispatch(action);
        }
    }

    log::debug!("Shortcut listener stopped");
}
