//! Turns each kind of capture into a [`StagedArtifact`].

use std::fs;
use std::path::PathBuf;

use crate::archive::{self, ArchiveInput, ArchiveRequest};

use super::{
    artifact::{CaptureKind, StagedArtifact, StagingArea},
    clipboard,
    dependencies::CaptureDependencies,
    screen,
    types::{CaptureError, Region},
};

/// Produces staged artifacts from files, the screen or the clipboard.
///
/// Every method blocks; run them off any thread that must stay responsive.
#[derive(Clone, Default)]
pub struct CaptureSource {
    dependencies: CaptureDependencies,
    staging: StagingArea,
}

impl CaptureSource {
    pub fn new(dependencies: CaptureDependencies, staging: StagingArea) -> Self {
        Self {
            dependencies,
            staging,
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Ask the file chooser for paths, then stage them.
    pub fn choose_files(&self) -> Result<StagedArtifact, CaptureError> {
        let paths = self.dependencies.chooser.choose()?;
        self.capture_files(paths)
    }

    /// Stage user-chosen paths.
    ///
    /// A single regular file is used in place. A single directory or several
    /// paths are bundled into a temporary ZIP archive. No paths at all is a
    /// cancellation.
    pub fn capture_files(&self, paths: Vec<PathBuf>) -> Result<StagedArtifact, CaptureError> {
        match paths.as_slice() {
            [] => Err(CaptureError::Cancelled("no files were selected".to_string())),
            [single] => {
                let metadata = fs::metadata(single).map_err(|e| CaptureError::Unreadable {
                    path: single.clone(),
                    reason: e.to_string(),
                })?;
                if metadata.is_dir() {
                    archive_paths(&paths, &self.staging)
                } else {
                    log::info!("Using {} directly", single.display());
                    Ok(StagedArtifact::existing(single))
                }
            }
            _ => archive_paths(&paths, &self.staging),
        }
    }

    /// Let the user select a region, then capture it.
    pub fn capture_region(&self) -> Result<StagedArtifact, CaptureError> {
        match self.dependencies.selector.select()? {
            Some(region) => self.capture_region_at(region),
            None => Err(CaptureError::Cancelled("no region was selected".to_string())),
        }
    }

    /// Capture a known region.
    pub fn capture_region_at(&self, region: Region) -> Result<StagedArtifact, CaptureError> {
        if !region.is_valid() {
            return Err(CaptureError::InvalidRegion(region));
        }
        let image = self.dependencies.grabber.grab(Some(region))?;
        screen::stage_png(&image, &self.staging)
    }

    /// Capture the entire screen.
    pub fn capture_screen(&self) -> Result<StagedArtifact, CaptureError> {
        let image = self.dependencies.grabber.grab(None)?;
        screen::stage_png(&image, &self.staging)
    }

    /// Stage whatever the clipboard currently holds.
    pub fn capture_clipboard(&self) -> Result<StagedArtifact, CaptureError> {
        clipboard::stage_clipboard(self.dependencies.clipboard.as_ref(), &self.staging)
    }
}

/// Bundle `paths` into a new temporary ZIP artifact.
///
/// A partial bundle is removed before the error is returned.
pub(crate) fn archive_paths(
    paths: &[PathBuf],
    staging: &StagingArea,
) -> Result<StagedArtifact, CaptureError> {
    let inputs = paths
        .iter()
        .map(ArchiveInput::from_path)
        .collect::<Result<Vec<_>, _>>()?;

    let (artifact, file) = staging.create(CaptureKind::Files)?;
    drop(file);

    let request = ArchiveRequest {
        inputs,
        bundle_path: artifact.path().to_path_buf(),
        root: archive::common_root(paths),
    };

    let mut last_percent = None;
    let result = archive::archive(&request, |done, total| {
        let percent = if total == 0 { 100 } else { done * 100 / total };
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            log::trace!("Archiving: {}%", percent);
        }
        if done == total {
            last_percent = None;
        }
    });

    match result {
        Ok(_) => Ok(artifact),
        Err(e) => {
            artifact.discard();
            Err(e.into())
        }
    }
}
