use std::collections::{BTreeSet, HashMap};

use crate::config::{Chord, ShortcutAction};

/// Minimum number of held keys before chords are evaluated.
const MIN_CHORD_KEYS: usize = 2;

/// Matches the set of currently held keys against configured chords.
///
/// Only the transition into a fully matched state fires; holding a chord, or
/// repeated key-down events for keys already held, never fire again.
#[derive(Debug, Clone)]
pub struct ShortcutMatcher {
    chords: Vec<Chord>,
    pressed: BTreeSet<u32>,
}

impl ShortcutMatcher {
    /// Create a matcher. Chords with fewer than two keys, or two chords with the
    /// same key set, are rejected.
    pub fn new(chords: Vec<Chord>) -> Result<Self, String> {
        let mut seen: HashMap<&[u32], ShortcutAction> = HashMap::new();
        for chord in &chords {
            if chord.keys().len() < MIN_CHORD_KEYS {
                return Err(format!(
                    "Shortcut '{}' for {:?} needs at least two distinct keys",
                    chord,
                    chord.action()
                ));
            }
            if let Some(existing) = seen.insert(chord.keys(), chord.action()) {
                return Err(format!(
                    "Duplicate shortcut '{}' assigned to both {:?} and {:?}",
                    chord,
                    existing,
                    chord.action()
                ));
            }
        }

        Ok(Self {
            chords,
            pressed: BTreeSet::new(),
        })
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    /// Record a key press and return the action of the chord it completes, if any.
    pub fn key_down(&mut self, code: u32) -> Option<ShortcutAction> {
        if !self.pressed.insert(code) {
            // auto-repeat or duplicate delivery
            return None;
        }
        if self.pressed.len() < MIN_CHORD_KEYS {
            return None;
        }

        let pressed: Vec<u32> = self.pressed.iter().copied().collect();
        let action = self
            .chords
            .iter()
            .find(|chord| chord.is_triggered_by(&pressed))
            .map(Chord::action);

        if let Some(action) = action {
            log::debug!("Chord {:?} matched {:?}", pressed, action);
        }
        action
    }

    /// Record a key release. Releasing a key that is not held is a no-op.
    pub fn key_up(&mut self, code: u32) {
        self.pressed.remove(&code);
    }

    /// Forget all held keys.
    pub fn reset(&mut self) {
        self.pressed.clear();
    }

    pub fn pressed(&self) -> impl Iterator<Item = u32> + '_ {
        self.pressed.iter().copied()
    }
}
