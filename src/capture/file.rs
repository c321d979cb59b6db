//! Local copies of staged captures.

use super::{artifact::StagedArtifact, types::CaptureError};
use crate::config::SaveConfig;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for local copies.
#[derive(Debug, Clone)]
pub struct FileSaveConfig {
    /// Directory to save copies to.
    pub save_directory: PathBuf,
    /// Filename template (supports chrono format specifiers).
    pub filename_template: String,
}

impl FileSaveConfig {
    /// Build from the `[save]` section, `None` when copies are disabled.
    pub fn from_config(config: &SaveConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            save_directory: expand_tilde(&config.directory),
            filename_template: config.filename_template.clone(),
        })
    }
}

/// Generate a filename based on the template and current time.
///
/// `extension` is appended with a dot unless empty.
pub fn generate_filename(template: &str, extension: &str) -> String {
    let now = Local::now();
    let filename = now.format(template).to_string();
    if extension.is_empty() {
        filename
    } else {
        format!("{}.{}", filename, extension)
    }
}

/// Ensure the save directory exists, creating it if necessary.
pub fn ensure_directory_exists(directory: &Path) -> Result<PathBuf, CaptureError> {
    if !directory.exists() {
        log::info!("Creating save directory: {}", directory.display());
        fs::create_dir_all(directory)?;
    }

    let canonical = directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf());

    Ok(canonical)
}

/// Extension the saved copy should carry.
fn copy_extension(artifact: &StagedArtifact) -> String {
    match artifact.kind() {
        Some(kind) => kind.extension().to_string(),
        None => artifact
            .path()
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// First path in `directory` named `filename` that does not exist yet.
fn free_path(directory: &Path, filename: &str) -> PathBuf {
    let candidate = directory.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };
    let mut idx = 2usize;
    loop {
        let name = match ext {
            Some(ext) => format!("{stem}-{idx}.{ext}"),
            None => format!("{stem}-{idx}"),
        };
        let candidate = directory.join(name);
        if !candidate.exists() {
            return candidate;
        }
        idx += 1;
    }
}

/// Copy a staged artifact into the save directory.
///
/// Returns the path of the copy.
pub fn save_copy(
    artifact: &StagedArtifact,
    config: &FileSaveConfig,
) -> Result<PathBuf, CaptureError> {
    let directory = ensure_directory_exists(&config.save_directory)?;

    let filename = generate_filename(&config.filename_template, &copy_extension(artifact));
    let file_path = free_path(&directory, &filename);

    log::info!(
        "Saving a copy of {} to {}",
        artifact.path().display(),
        file_path.display()
    );

    let written = fs::copy(artifact.path(), &file_path)?;
    log::debug!("File written: {} bytes", written);

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&file_path, Permissions::from_mode(0o600))?;
    }

    Ok(file_path)
}

/// Expand tilde (~) in path strings.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}
