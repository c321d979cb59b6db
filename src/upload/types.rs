//! Requests, outcomes and errors of the end-to-end upload pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::capture::{CaptureError, Region};
use crate::config::ShortcutAction;
use crate::transport::TransportError;

/// What to capture before uploading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRequest {
    /// Paths the user already picked.
    Files(Vec<PathBuf>),
    /// Ask the file chooser first.
    ChooseFiles,
    /// A screen region; `None` asks the region selector.
    Region(Option<Region>),
    Screen,
    Clipboard,
}

impl From<ShortcutAction> for UploadRequest {
    fn from(action: ShortcutAction) -> Self {
        match action {
            ShortcutAction::CaptureRegion => UploadRequest::Region(None),
            ShortcutAction::CaptureScreen => UploadRequest::Screen,
            ShortcutAction::CaptureFiles => UploadRequest::ChooseFiles,
            ShortcutAction::CaptureClipboard => UploadRequest::Clipboard,
        }
    }
}

/// A finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Public URL of the uploaded file.
    pub url: String,
    /// Local copy written before the transfer, if enabled.
    pub saved_copy: Option<PathBuf>,
    /// Whether the URL made it onto the clipboard.
    pub copied_to_clipboard: bool,
}

/// Progress of the current upload, as seen by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Capturing,
    Uploading(u8),
    Success,
    Failed(String),
    Cancelled(String),
}

/// Final state of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success(UploadResult),
    Failed { title: String, message: String },
    Cancelled(String),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success(_))
    }
}

impl From<Result<UploadResult, UploadError>> for UploadOutcome {
    fn from(result: Result<UploadResult, UploadError>) -> Self {
        match result {
            Ok(result) => UploadOutcome::Success(result),
            Err(err) if err.is_cancelled() => UploadOutcome::Cancelled(err.to_string()),
            Err(err) => UploadOutcome::Failed {
                title: err.title().to_string(),
                message: err.message(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A background task died before reporting.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            UploadError::Capture(err) => err.is_cancelled(),
            UploadError::Transport(err) => err.is_aborted(),
            UploadError::Task(_) => false,
        }
    }

    /// Short heading for notifications and CLI output.
    pub fn title(&self) -> &'static str {
        match self {
            UploadError::Capture(CaptureError::Cancelled(_))
            | UploadError::Transport(TransportError::Aborted) => "Upload cancelled",
            UploadError::Capture(CaptureError::Archive(_)) => "Archive error",
            UploadError::Capture(CaptureError::Unreadable { .. }) => "Read error",
            UploadError::Capture(_) => "Capture error",
            UploadError::Transport(TransportError::Failed { stage, .. }) => stage.title(),
            UploadError::Task(_) => "Error",
        }
    }

    /// Body text: what went wrong, plus the stage description for transfers.
    pub fn message(&self) -> String {
        match self {
            UploadError::Transport(TransportError::Failed { stage, message }) => {
                format!("{}: {}", stage.describe(), message)
            }
            other => other.to_string(),
        }
    }
}
