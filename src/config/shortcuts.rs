//! Shortcut chord configuration types and parsing.
//!
//! Chords are written as key codes joined with `+`, e.g. `"56+2"` for
//! Alt + 1 with evdev key codes. Key order does not matter.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Actions that can be bound to a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    CaptureRegion,
    CaptureScreen,
    CaptureFiles,
    CaptureClipboard,
}

/// A set of simultaneously held keys bound to an action.
///
/// The key codes are kept sorted and deduplicated so two chords compare equal
/// regardless of the order their keys were written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    keys: Vec<u32>,
    action: ShortcutAction,
}

impl Chord {
    pub fn new(mut keys: Vec<u32>, action: ShortcutAction) -> Self {
        keys.sort_unstable();
        keys.dedup();
        Self { keys, action }
    }

    /// Parse a chord string like `"56+2"` or `"29 + 42 + 31"`.
    pub fn parse(s: &str, action: ShortcutAction) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty shortcut string".to_string());
        }

        let mut keys = Vec::new();
        for part in s.split('+') {
            let part = part.trim();
            let code = part
                .parse::<u32>()
                .map_err(|_| format!("Invalid key code '{}' in shortcut '{}'", part, s))?;
            keys.push(code);
        }

        let chord = Self::new(keys, action);
        if chord.keys.len() < 2 {
            return Err(format!(
                "Shortcut '{}' needs at least two distinct keys",
                s
            ));
        }
        Ok(chord)
    }

    /// Sorted key codes of this chord.
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    pub fn action(&self) -> ShortcutAction {
        self.action
    }

    /// Whether `pressed` (sorted, deduplicated) is exactly this chord's key set.
    pub fn is_triggered_by(&self, pressed: &[u32]) -> bool {
        self.keys == pressed
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .keys
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("+");
        f.write_str(&joined)
    }
}

/// Configured chords, one per action.
///
/// ```toml
/// [shortcuts]
/// capture_region = "56+2"
/// capture_clipboard = "56+5"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShortcutsConfig {
    #[serde(default = "default_capture_region")]
    pub capture_region: String,

    #[serde(default = "default_capture_screen")]
    pub capture_screen: String,

    #[serde(default = "default_capture_files")]
    pub capture_files: String,

    #[serde(default = "default_capture_clipboard")]
    pub capture_clipboard: String,
}

impl Default for ShortcutsConfig {
    fn default() -> Self {
        Self {
            capture_region: default_capture_region(),
            capture_screen: default_capture_screen(),
            capture_files: default_capture_files(),
            capture_clipboard: default_capture_clipboard(),
        }
    }
}

impl ShortcutsConfig {
    /// Build the chord list used by the shortcut matcher.
    /// Returns an error if a chord string is invalid or two actions share the same keys.
    pub fn build_chords(&self) -> Result<Vec<Chord>, String> {
        let mut seen: HashMap<Vec<u32>, ShortcutAction> = HashMap::new();
        let mut chords = Vec::new();

        for (chord_str, action) in [
            (&self.capture_region, ShortcutAction::CaptureRegion),
            (&self.capture_screen, ShortcutAction::CaptureScreen),
            (&self.capture_files, ShortcutAction::CaptureFiles),
            (&self.capture_clipboard, ShortcutAction::CaptureClipboard),
        ] {
            let chord = Chord::parse(chord_str, action)?;
            if let Some(existing) = seen.insert(chord.keys().to_vec(), action) {
                return Err(format!(
                    "Duplicate shortcut '{}' assigned to both {:?} and {:?}",
                    chord_str, existing, action
                ));
            }
            chords.push(chord);
        }

        Ok(chords)
    }
}

fn default_capture_region() -> String {
    "56+2".to_string()
}

fn default_capture_screen() -> String {
    "56+3".to_string()
}

fn default_capture_files() -> String {
    "56+4".to_string()
}

fn default_capture_clipboard() -> String {
    "56+5".to_string()
}
