use std::path::PathBuf;

use super::run;
use crate::capture::{dependencies::FileChooser, types::CaptureError};

const SEPARATOR: &str = "\n";

/// File selection with the `zenity` dialog.
pub struct ZenityChooser;

impl FileChooser for ZenityChooser {
    fn choose(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let output = run(
            "zenity",
            &[
                "--file-selection",
                "--multiple",
                "--separator",
                SEPARATOR,
                "--title",
                "Select files to upload",
            ],
            CaptureError::ChooserError,
        )?;

        match output.status.code() {
            Some(0) => Ok(parse_selection(&String::from_utf8_lossy(&output.stdout))),
            // 1 = cancelled or closed
            Some(1) => Ok(Vec::new()),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(CaptureError::ChooserError(format!(
                    "zenity failed: {}",
                    stderr.trim()
                )))
            }
        }
    }
}

fn parse_selection(stdout: &str) -> Vec<PathBuf> {
    stdout
        .split(SEPARATOR)
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}
