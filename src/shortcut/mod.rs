//! Global shortcut handling.
//!
//! Key events arrive from an external hook as key codes. The [`ShortcutMatcher`]
//! tracks which keys are held and reports a chord's action when the held set
//! becomes exactly that chord. The [`ShortcutListener`] runs a matcher on a
//! background thread and dispatches matched actions.

mod listener;
mod matcher;

pub use crate::config::{Chord, ShortcutAction};
pub use listener::{Dispatch, KeyEvent, ShortcutListener};
pub use matcher::ShortcutMatcher;
