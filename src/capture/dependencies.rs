use std::{path::PathBuf, sync::Arc};

use image::RgbaImage;
use thiserror::Error;

use crate::capture::{
    sources,
    types::{CaptureError, Region},
};

/// Interactive selection of a screen rectangle.
pub trait RegionSelector: Send + Sync {
    /// `Ok(None)` means the user dismissed the selector.
    fn select(&self) -> Result<Option<Region>, CaptureError>;
}

/// Reads pixels from the screen, optionally restricted to a region.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self, region: Option<Region>) -> Result<RgbaImage, CaptureError>;
}

/// Lets the user pick files and directories.
pub trait FileChooser: Send + Sync {
    /// An empty list means the dialog was cancelled.
    fn choose(&self) -> Result<Vec<PathBuf>, CaptureError>;
}

/// Why a single clipboard flavor could not be read.
#[derive(Debug, Error)]
pub enum FlavorError {
    #[error("flavor not available: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Access to the clipboard contents in each of the representations it offers.
pub trait ClipboardProvider: Send + Sync {
    /// Offered flavors (MIME types or atom names). Empty when the clipboard is empty.
    fn flavors(&self) -> Result<Vec<String>, CaptureError>;

    /// Raw bytes of one offered flavor.
    fn read(&self, flavor: &str) -> Result<Vec<u8>, FlavorError>;
}

/// Bundle of the external collaborators used by the capture source. Each
/// component can be mocked in tests.
#[derive(Clone)]
pub struct CaptureDependencies {
    pub selector: Arc<dyn RegionSelector>,
    pub grabber: Arc<dyn ScreenGrabber>,
    pub chooser: Arc<dyn FileChooser>,
    pub clipboard: Arc<dyn ClipboardProvider>,
}

impl Default for CaptureDependencies {
    fn default() -> Self {
        Self {
            selector: Arc::new(sources::SlurpSelector),
            grabber: Arc::new(sources::GrimGrabber),
            chooser: Arc::new(sources::ZenityChooser),
            clipboard: Arc::new(sources::WaylandClipboard),
        }
    }
}
