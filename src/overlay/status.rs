use std::fmt;

use super::placement::{PlacementBranch, PlacementError};
use crate::garment::GarmentCategory;

/// Human-readable detection state shown next to the canvas. Last write wins.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Starting,
    WaitingForCamera,
    NoGarmentLoaded,
    NoPersonDetected,
    BodyPartMissing(PlacementError),
    Applied {
        category: GarmentCategory,
        branch: PlacementBranch,
    },
    ExtractionTimedOut,
    TickFailed(String),
    CameraUnavailable(String),
    DetectorUnavailable(String),
    Stopped,
}

impl Status {
    /// States that need a user action before anything else happens.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CameraUnavailable(_) | Self::DetectorUnavailable(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting camera and pose detector..."),
            Self::WaitingForCamera => f.write_str("waiting for camera"),
            Self::NoGarmentLoaded => f.write_str("no clothing image loaded"),
            Self::NoPersonDetected => f.write_str("no person detected"),
            Self::BodyPartMissing(reason) => write!(f, "{reason}"),
            Self::Applied { category, branch } => {
                write!(f, "{category} applied")?;
                match branch {
                    PlacementBranch::ShouldersOnly => f.write_str(" (hips not visible, fitted to shoulders)"),
                    PlacementBranch::Shorts => f.write_str(" (knee length)"),
                    PlacementBranch::Torso | PlacementBranch::FullLength => Ok(()),
                }
            }
            Self::ExtractionTimedOut => f.write_str("pose detection is slow, skipping frame"),
            Self::TickFailed(reason) => write!(f, "detection error: {reason}; resuming shortly"),
            Self::CameraUnavailable(reason) => write!(f, "camera unavailable: {reason}"),
            Self::DetectorUnavailable(reason) => {
                write!(f, "pose detector unavailable: {reason}; press retry to try again")
            }
            Self::Stopped => f.write_str("stopped"),
        }
    }
}
