//! Default external collaborators: wlroots command-line tools and the Wayland clipboard.

use std::process::{Command, Output, Stdio};

use crate::capture::types::CaptureError;

mod paste;
mod wlroots;
mod zenity;

pub use paste::WaylandClipboard;
pub use wlroots::{GrimGrabber, SlurpSelector};
pub use zenity::ZenityChooser;

/// Run `program` with `args`, capturing stdout and stderr.
///
/// Only a failure to spawn is an error here; callers interpret the exit status.
fn run(
    program: &str,
    args: &[&str],
    map_err: fn(String) -> CaptureError,
) -> Result<Output, CaptureError> {
    log::debug!("Running {} {}", program, args.join(" "));
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| map_err(format!("Failed to run {} (is it installed?): {}", program, e)))
}
