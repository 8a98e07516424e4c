//! Hard errors of a try-on session.
//!
//! Per-frame placement failures are not here: they live in
//! [`crate::overlay::placement::PlacementError`] and never stop the scheduler.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TryOnError {
    /// Garment image could not be fetched or decoded. Recoverable by
    /// selecting another garment.
    #[error("failed to load garment image from {source_name}: {reason}")]
    GarmentLoad { source_name: String, reason: String },

    /// Pose backend did not come up after all retries.
    #[error("pose detector failed to initialize after {attempts} attempts: {reason}")]
    DetectorInit { attempts: u32, reason: String },

    /// Camera permission denied or device unavailable. Never retried.
    #[error("camera unavailable: {0}")]
    CameraAccess(String),

    /// Unexpected failure inside a single tick (extraction or drawing).
    #[error("detection tick failed: {0}")]
    DetectionTick(String),

    #[error("session is not running")]
    NotRunning,
}

impl TryOnError {
    /// Hard errors that require an action from the surrounding UI
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DetectorInit { .. } | Self::CameraAccess(_))
    }
}

pub type TryOnResult<T> = Result<T, TryOnError>;
