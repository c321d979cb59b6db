//! Capture functionality for snapship.
//!
//! This module turns user input into a single staged file:
//! - File and directory selections (bundled into a ZIP when needed)
//! - Region and entire-screen screenshots (PNG)
//! - Clipboard contents (file lists, text or raw payloads)
//! - Optional local copies and result-URL clipboard integration

pub mod artifact;
pub mod clipboard;
pub mod dependencies;
pub mod file;
pub mod types;

mod screen;
mod source;
mod sources;
#[cfg(test)]
mod tests;

pub use artifact::{CaptureKind, StagedArtifact, StagingArea};
pub use dependencies::{
    CaptureDependencies, ClipboardProvider, FileChooser, FlavorError, RegionSelector,
    ScreenGrabber,
};
pub use source::CaptureSource;
pub use types::{CaptureError, Region};
