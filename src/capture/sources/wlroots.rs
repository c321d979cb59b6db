use image::{ImageFormat, RgbaImage};

use super::run;
use crate::capture::{
    dependencies::{RegionSelector, ScreenGrabber},
    types::{CaptureError, Region},
};

/// Region selection with `slurp`.
pub struct SlurpSelector;

/// Screen capture with `grim`.
pub struct GrimGrabber;

impl RegionSelector for SlurpSelector {
    fn select(&self) -> Result<Option<Region>, CaptureError> {
        // `slurp` outputs geometry in the format "x,y widthxheight"
        let output = run("slurp", &["-f", "%x,%y %wx%h"], CaptureError::ScreenError)?;

        if !output.status.success() {
            // slurp exits non-zero when the selection is dismissed with Escape
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::info!("slurp returned no selection: {}", stderr.trim());
            return Ok(None);
        }

        let geometry = String::from_utf8_lossy(&output.stdout);
        let geometry = geometry.trim();
        if geometry.is_empty() {
            return Ok(None);
        }

        geometry
            .parse::<Region>()
            .map(Some)
            .map_err(CaptureError::ScreenError)
    }
}

impl ScreenGrabber for GrimGrabber {
    fn grab(&self, region: Option<Region>) -> Result<RgbaImage, CaptureError> {
        let geometry = region.map(|r| r.geometry());
        let mut args = vec!["-t", "ppm"];
        if let Some(geometry) = geometry.as_deref() {
            log::debug!("Capturing region via grim: {}", geometry);
            args.extend(["-g", geometry]);
        } else {
            log::debug!("Capturing entire screen via grim");
        }
        args.push("-");

        let output = run("grim", &args, CaptureError::ScreenError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::ScreenError(format!(
                "grim failed: {}",
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(CaptureError::ScreenError(
                "grim returned empty screenshot".into(),
            ));
        }

        let image = image::load_from_memory_with_format(&output.stdout, ImageFormat::Pnm)
            .map_err(|e| CaptureError::ImageError(format!("Failed to decode grim output: {}", e)))?;

        Ok(image.to_rgba8())
    }
}
