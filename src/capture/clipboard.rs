//! Clipboard integration: staging clipboard contents and copying result URLs.
//!
//! The clipboard offers its content in several flavors. They are tried in
//! priority order (file lists, then text, then any other typed payload); a
//! flavor that cannot be read is logged and skipped.

use std::cmp::Reverse;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use url::Url;
use wl_clipboard_rs::copy::{MimeType, Options, Source};

use super::{
    artifact::{CaptureKind, StagedArtifact, StagingArea},
    dependencies::{ClipboardProvider, FlavorError},
    source::archive_paths,
    types::CaptureError,
};

/// How a clipboard flavor is turned into an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlavorKind {
    /// Not content (selection bookkeeping targets).
    Unsupported,
    /// Any other typed payload, stored verbatim.
    Serialized,
    /// Plain text.
    Text,
    /// A list of file-system paths.
    FileList,
}

const FILE_LIST_TYPES: &[&str] = &["text/uri-list", "x-special/gnome-copied-files"];
const TEXT_TYPES: &[&str] = &["UTF8_STRING", "STRING", "TEXT", "text/plain"];
const BOOKKEEPING_TARGETS: &[&str] = &[
    "TARGETS",
    "MULTIPLE",
    "SAVE_TARGETS",
    "TIMESTAMP",
    "DELETE",
    "chromium/x-source-url",
];

/// Classify a single offered flavor.
pub fn classify(flavor: &str) -> FlavorKind {
    let base = flavor.split(';').next().unwrap_or(flavor).trim();

    if FILE_LIST_TYPES.contains(&base) {
        FlavorKind::FileList
    } else if TEXT_TYPES.contains(&base) || base.starts_with("text/plain") {
        FlavorKind::Text
    } else if BOOKKEEPING_TARGETS.contains(&base) || !base.contains('/') {
        FlavorKind::Unsupported
    } else {
        FlavorKind::Serialized
    }
}

/// Offered flavors in the order they should be attempted.
///
/// The sort is stable, so flavors of the same kind keep the order they were offered in.
pub fn prioritize(flavors: &[String]) -> Vec<(&str, FlavorKind)> {
    let mut ranked: Vec<(&str, FlavorKind)> = flavors
        .iter()
        .map(|flavor| (flavor.as_str(), classify(flavor)))
        .collect();
    ranked.sort_by_key(|(_, kind)| Reverse(*kind));
    ranked
}

/// Stage the clipboard contents as a single artifact.
pub(crate) fn stage_clipboard(
    provider: &dyn ClipboardProvider,
    staging: &StagingArea,
) -> Result<StagedArtifact, CaptureError> {
    let flavors = provider.flavors()?;
    if flavors.is_empty() {
        return Err(CaptureError::ClipboardError("clipboard is empty".to_string()));
    }

    log::debug!("Clipboard offers {} flavors: {:?}", flavors.len(), flavors);

    for (flavor, kind) in prioritize(&flavors) {
        if kind == FlavorKind::Unsupported {
            log::debug!("Skipping clipboard flavor {}", flavor);
            continue;
        }

        match stage_flavor(provider, staging, flavor, kind) {
            Ok(artifact) => {
                log::info!(
                    "Staged clipboard flavor {} as {}",
                    flavor,
                    artifact.path().display()
                );
                return Ok(artifact);
            }
            Err(StageFailure::Fallthrough(reason)) => {
                log::info!(
                    "Failed to get the clipboard data in the flavor {}: {}",
                    flavor,
                    reason
                );
            }
            Err(StageFailure::Fatal(err)) => return Err(err),
        }
    }

    Err(CaptureError::ClipboardError(
        "failed to find a usable data flavor".to_string(),
    ))
}

enum StageFailure {
    /// Try the next flavor.
    Fallthrough(String),
    /// Staging itself is broken; no other flavor will do better.
    Fatal(CaptureError),
}

impl From<FlavorError> for StageFailure {
    fn from(err: FlavorError) -> Self {
        StageFailure::Fallthrough(err.to_string())
    }
}

fn stage_flavor(
    provider: &dyn ClipboardProvider,
    staging: &StagingArea,
    flavor: &str,
    kind: FlavorKind,
) -> Result<StagedArtifact, StageFailure> {
    let data = provider.read(flavor)?;
    if data.is_empty() {
        return Err(StageFailure::Fallthrough("no data".to_string()));
    }

    match kind {
        FlavorKind::FileList => {
            let paths = parse_file_list(&data);
            if paths.is_empty() {
                return Err(StageFailure::Fallthrough(
                    "no local paths in file list".to_string(),
                ));
            }
            archive_paths(&paths, staging).map_err(|e| match e {
                CaptureError::SaveError(_) => StageFailure::Fatal(e),
                other => StageFailure::Fallthrough(other.to_string()),
            })
        }
        FlavorKind::Text => {
            let text = String::from_utf8(data)
                .map_err(|e| StageFailure::Fallthrough(format!("not UTF-8 text: {}", e)))?;
            write_staged(staging, CaptureKind::Text, |file| {
                file.write_all(text.as_bytes())?;
                file.write_all(b"\n")
            })
        }
        FlavorKind::Serialized => {
            write_staged(staging, CaptureKind::Blob, |file| file.write_all(&data))
        }
        FlavorKind::Unsupported => Err(StageFailure::Fallthrough(
            "unsupported flavor".to_string(),
        )),
    }
}

fn write_staged<F>(
    staging: &StagingArea,
    kind: CaptureKind,
    write: F,
) -> Result<StagedArtifact, StageFailure>
where
    F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
{
    let (artifact, mut file) = staging
        .create(kind)
        .map_err(|e| StageFailure::Fatal(CaptureError::SaveError(e)))?;

    if let Err(e) = write(&mut file).and_then(|()| file.sync_all()) {
        artifact.discard();
        return Err(StageFailure::Fallthrough(e.to_string()));
    }

    Ok(artifact)
}

/// Local paths from a `text/uri-list` (or GNOME copied-files) payload.
///
/// Comment lines and the GNOME `copy`/`cut` verb line are ignored, as are
/// URIs that do not name a local file.
pub fn parse_file_list(data: &[u8]) -> Vec<PathBuf> {
    String::from_utf8_lossy(data)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| *line != "copy" && *line != "cut")
        .filter_map(|line| match Url::parse(line) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
            Ok(_) => None,
            Err(_) if line.starts_with('/') => Some(PathBuf::from(line)),
            Err(_) => None,
        })
        .collect()
}

/// Copy a result URL to the Wayland clipboard as plain text.
///
/// Prefers the `wl-copy` command and falls back to wl-clipboard-rs.
pub fn copy_text_to_clipboard(text: &str) -> Result<(), CaptureError> {
    log::debug!("Attempting to copy {} bytes of text to clipboard", text.len());

    match copy_via_command(text) {
        Ok(()) => {
            log::info!("Successfully copied to clipboard via wl-copy command");
            Ok(())
        }
        Err(cmd_err) => {
            log::warn!(
                "wl-copy command path failed ({}). Falling back to wl-clipboard-rs",
                cmd_err
            );
            match copy_via_library(text) {
                Ok(()) => {
                    log::info!("Successfully copied to clipboard via wl-clipboard-rs fallback");
                    Ok(())
                }
                Err(lib_err) => {
                    let combined = format!(
                        "wl-copy failed: {} ; wl-clipboard-rs failed: {}",
                        cmd_err, lib_err
                    );
                    Err(CaptureError::ClipboardError(combined))
                }
            }
        }
    }
}

fn copy_via_library(text: &str) -> Result<(), CaptureError> {
    let opts = Options::new();
    opts.copy(
        Source::Bytes(text.as_bytes().into()),
        MimeType::Specific("text/plain;charset=utf-8".to_string()),
    )
    .map_err(|e| CaptureError::ClipboardError(format!("wl-clipboard-rs error: {}", e)))?;

    Ok(())
}

fn copy_via_command(text: &str) -> Result<(), CaptureError> {
    let mut child = Command::new("wl-copy")
        .arg("--type")
        .arg("text/plain;charset=utf-8")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            CaptureError::ClipboardError(format!(
                "Failed to spawn wl-copy (is it installed?): {}",
                e
            ))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).map_err(|e| {
            CaptureError::ClipboardError(format!("Failed to write to wl-copy stdin: {}", e))
        })?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| CaptureError::ClipboardError(format!("Failed to wait for wl-copy: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CaptureError::ClipboardError(format!(
            "wl-copy failed: {}",
            stderr
        )));
    }

    Ok(())
}
