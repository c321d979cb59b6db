//! Staged artifacts: the single file that represents one capture.
//!
//! Temporary artifacts are named `snapship_<random>.<kind>.tmp` (or
//! `snapship_<random>.tmp` for opaque payloads) so leftovers from a crash can
//! be recognised and purged.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Prefix shared by every temporary artifact.
pub const TEMP_PREFIX: &str = "snapship_";
/// Marks a file as temporary, always the final extension.
pub const TEMP_SUFFIX: &str = ".tmp";

/// What a staged artifact contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// A ZIP bundle of one or more files.
    Files,
    /// A PNG image.
    Image,
    /// UTF-8 text.
    Text,
    /// An opaque clipboard payload, stored as offered.
    Blob,
}

impl CaptureKind {
    /// Extension describing the content, empty for opaque payloads.
    pub fn extension(self) -> &'static str {
        match self {
            CaptureKind::Files => "zip",
            CaptureKind::Image => "png",
            CaptureKind::Text => "txt",
            CaptureKind::Blob => "",
        }
    }

    /// Full temp-file suffix, e.g. `.png.tmp`.
    pub fn temp_suffix(self) -> String {
        match self.extension() {
            "" => TEMP_SUFFIX.to_string(),
            ext => format!(".{ext}{TEMP_SUFFIX}"),
        }
    }
}

/// A single-file payload ready to be transferred.
///
/// The file is never modified once staged. Temporary artifacts are owned by
/// whoever holds the value and must be discarded after use; direct references
/// to the user's own files are never deleted.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
    kind: Option<CaptureKind>,
    temporary: bool,
    len: OnceLock<u64>,
}

impl StagedArtifact {
    /// Reference an existing file the user chose directly.
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
            temporary: false,
            len: OnceLock::new(),
        }
    }

    fn temporary(path: PathBuf, kind: CaptureKind) -> Self {
        Self {
            path,
            kind: Some(kind),
            temporary: true,
            len: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Content kind for staged temp files, `None` for a direct file reference.
    pub fn kind(&self) -> Option<CaptureKind> {
        self.kind
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Local file name, which is also the remote name.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Size of the artifact in bytes, read from disk on first use.
    pub fn len(&self) -> io::Result<u64> {
        if let Some(len) = self.len.get() {
            return Ok(*len);
        }
        let len = fs::metadata(&self.path)?.len();
        Ok(*self.len.get_or_init(|| len))
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete the file if it is temporary. Failures are logged.
    pub fn discard(&self) {
        if !self.temporary {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove staged file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Directory temporary artifacts are created in.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl Default for StagingArea {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new, empty temp file for `kind` and return it opened for writing.
    pub fn create(&self, kind: CaptureKind) -> io::Result<(StagedArtifact, File)> {
        let (file, path) = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&kind.temp_suffix())
            .tempfile_in(&self.dir)?
            .keep()
            .map_err(|e| e.error)?;

        log::debug!("Staged {:?} capture at {}", kind, path.display());
        Ok((StagedArtifact::temporary(path, kind), file))
    }
}

/// Whether `name` follows the temp-file naming convention.
///
/// Public so sweep tools can find staging files left behind by a crash.
pub fn is_staging_file_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
        && name.ends_with(TEMP_SUFFIX)
        && name.len() > TEMP_PREFIX.len() + TEMP_SUFFIX.len()
}
