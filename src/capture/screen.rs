//! Screenshot encoding.

use std::io::{BufWriter, Write};

use image::{ImageFormat, RgbaImage};

use super::{
    artifact::{CaptureKind, StagedArtifact, StagingArea},
    types::CaptureError,
};

/// Encode `image` as PNG into a new temporary artifact.
pub(crate) fn stage_png(
    image: &RgbaImage,
    staging: &StagingArea,
) -> Result<StagedArtifact, CaptureError> {
    let (artifact, file) = staging.create(CaptureKind::Image)?;

    let mut writer = BufWriter::new(file);
    let encoded = image
        .write_to(&mut writer, ImageFormat::Png)
        .map_err(|e| {
            CaptureError::ImageError(format!("Couldn't encode the screenshot as PNG: {}", e))
        })
        .and_then(|()| writer.flush().map_err(CaptureError::from));

    if let Err(e) = encoded {
        artifact.discard();
        return Err(e);
    }

    log::info!(
        "Saved {}x{} screenshot to {}",
        image.width(),
        image.height(),
        artifact.path().display()
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    #[test]
    fn writes_a_decodable_png() {
        let temp = TempDir::new().unwrap();
        let staging = StagingArea::new(temp.path());
        let image = RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255]));

        let artifact = stage_png(&image, &staging).unwrap();
        let bytes = std::fs::read(artifact.path()).unwrap();
        assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }
}
