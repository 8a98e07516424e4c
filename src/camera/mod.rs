#[cfg(feature = "desktop")]
pub mod capture;

#[cfg(feature = "desktop")]
pub use capture::{OpenCvCamera, ThreadedCamera};

use std::sync::Arc;

use anyhow::Result;
use image::RgbaImage;

use crate::config::CameraConfig;

/// One captured video frame. `id` increases with every new frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub image: Arc<RgbaImage>,
}

/// Live video source feeding the session.
pub trait CameraSource: Send {
    /// Acquires the device. Failure here is final (permission denied, no device).
    fn start(&mut self, config: &CameraConfig) -> Result<()>;

    /// Native resolution once started.
    fn resolution(&self) -> (u32, u32);

    /// Id of the newest frame; 0 before the first one arrives.
    fn frame_id(&self) -> u64;

    fn latest_frame(&self) -> Option<Frame>;

    /// Releases the device. Idempotent.
    fn stop(&mut self);
}
