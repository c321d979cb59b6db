use std::io::Read;

use wl_clipboard_rs::paste::{self, ClipboardType, MimeType, Seat};

use crate::capture::{
    dependencies::{ClipboardProvider, FlavorError},
    types::CaptureError,
};

/// The regular Wayland clipboard, read through wl-clipboard-rs.
pub struct WaylandClipboard;

impl ClipboardProvider for WaylandClipboard {
    fn flavors(&self) -> Result<Vec<String>, CaptureError> {
        match paste::get_mime_types(ClipboardType::Regular, Seat::Unspecified) {
            Ok(types) => {
                let mut types: Vec<String> = types.into_iter().collect();
                types.sort();
                Ok(types)
            }
            Err(paste::Error::ClipboardEmpty) | Err(paste::Error::NoMimeType) => Ok(Vec::new()),
            Err(e) => Err(CaptureError::ClipboardError(format!(
                "Failed to list clipboard types: {}",
                e
            ))),
        }
    }

    fn read(&self, flavor: &str) -> Result<Vec<u8>, FlavorError> {
        let (mut pipe, _) = paste::get_contents(
            ClipboardType::Regular,
            Seat::Unspecified,
            MimeType::Specific(flavor),
        )
        .map_err(|e| FlavorError::Unavailable(e.to_string()))?;

        let mut contents = Vec::new();
        pipe.read_to_end(&mut contents)?;
        Ok(contents)
    }
}
