//! Data types for capture functionality.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::archive::ArchiveError;

/// A screen rectangle in compositor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Selections of 2 pixels or less in either direction count as "no selection".
    pub fn is_valid(&self) -> bool {
        self.width > 2 && self.height > 2
    }

    /// Geometry string understood by `grim -g`.
    pub fn geometry(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Region {
    type Err = String;

    /// Parse `"x,y WxH"`, the format printed by `slurp`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid region '{}', expected \"x,y WxH\"", s.trim());

        let (origin, size) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let (x, y) = origin.split_once(',').ok_or_else(invalid)?;
        let (width, height) = size.trim().split_once('x').ok_or_else(invalid)?;

        Ok(Self {
            x: x.trim().parse().map_err(|_| invalid())?,
            y: y.trim().parse().map_err(|_| invalid())?,
            width: width.trim().parse().map_err(|_| invalid())?,
            height: height.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Errors that can occur while producing a staged artifact.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid selection {0}: width and height must be larger than 2 pixels")]
    InvalidRegion(Region),

    #[error("Failed to stage capture: {0}")]
    SaveError(#[from] std::io::Error),

    #[error("Couldn't store the files in a ZIP archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Cannot read {path}: {reason}", path = .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Clipboard capture failed: {0}")]
    ClipboardError(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Screen capture failed: {0}")]
    ScreenError(String),

    #[error("File chooser failed: {0}")]
    ChooserError(String),
}

impl CaptureError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CaptureError::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_validity_threshold() {
        assert!(!Region::new(0, 0, 2, 2).is_valid());
        assert!(!Region::new(0, 0, 3, 2).is_valid());
        assert!(!Region::new(0, 0, 2, 3).is_valid());
        assert!(!Region::new(10, 10, 0, 0).is_valid());
        assert!(Region::new(0, 0, 3, 3).is_valid());
    }

    #[test]
    fn region_parses_slurp_output() {
        let region: Region = "12,-40 300x200\n".parse().unwrap();
        assert_eq!(region, Region::new(12, -40, 300, 200));
        assert_eq!(region.geometry(), "12,-40 300x200");
    }

    #[test]
    fn region_rejects_malformed_geometry() {
        assert!("".parse::<Region>().is_err());
        assert!("1,2".parse::<Region>().is_err());
        assert!("1,2 3by4".parse::<Region>().is_err());
        assert!("a,b 3x4".parse::<Region>().is_err());
    }
}
