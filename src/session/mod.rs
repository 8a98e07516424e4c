//! Explicit try-on session: camera, pose backend, garment and canvas with a
//! start/stop lifecycle. One async task drives it through [`FrameScheduler`].

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{ActiveGarment, OverlayPipeline, RenderOutcome};
pub use scheduler::FrameScheduler;

use std::path::Path;
use std::time::Duration;

use image::RgbaImage;
use tokio::time;
use tracing::{info, warn};

use crate::camera::CameraSource;
use crate::config::{CameraConfig, Config, SchedulerConfig};
use crate::error::{TryOnError, TryOnResult};
use crate::garment::{GarmentAsset, GarmentCategory, SubTag};
use crate::overlay::{OverlayRect, Status};
use crate::pose::KeypointExtractor;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Camera has not delivered a frame yet.
    NoFrame,
    /// Frame id did not advance since the last tick; nothing redrawn.
    Unchanged,
    /// Canvas redrawn. `overlay` is the clamped garment rect, if one was drawn.
    Rendered { overlay: Option<OverlayRect> },
}

pub struct TryOnSession<C, E> {
    camera: C,
    extractor: E,
    pipeline: OverlayPipeline,
    camera_config: CameraConfig,
    scheduler_config: SchedulerConfig,
    status: Status,
    running: bool,
    last_frame_id: Option<u64>,
}

impl<C: CameraSource, E: KeypointExtractor> TryOnSession<C, E> {
    pub fn new(config: &Config, camera: C, extractor: E) -> Self {
        Self {
            camera,
            extractor,
            pipeline: OverlayPipeline::new(config),
            camera_config: config.camera.clone(),
            scheduler_config: config.scheduler.clone(),
            status: Status::Starting,
            running: false,
            last_frame_id: None,
        }
    }

    /// Camera first (never retried), then the pose backend with bounded retries.
    /// On failure everything acquired so far is released again.
    pub async fn start(&mut self) -> TryOnResult<()> {
        if self.running {
            return Ok(());
        }
        self.status = Status::Starting;

        if let Err(e) = self.camera.start(&self.camera_config) {
            let reason = format!("{e:#}");
            warn!(%reason, "camera start failed");
            self.camera.stop();
            self.status = Status::CameraUnavailable(reason.clone());
            return Err(TryOnError::CameraAccess(reason));
        }
        let (w, h) = self.camera.resolution();
        info!(width = w, height = h, "camera ready");

        let attempts = self.scheduler_config.init_attempts.max(1);
        let delay = Duration::from_millis(self.scheduler_config.init_retry_delay_ms);
        let mut last_error = String::new();
        let mut ready = false;
        for attempt in 1..=attempts {
            match self.extractor.initialize().await {
                Ok(()) => {
                    info!(attempt, "pose detector ready");
                    ready = true;
                    break;
                }
                Err(e) => {
                    last_error = format!("{e:#}");
                    warn!(attempt, attempts, reason = %last_error, "pose detector init failed");
                    if attempt < attempts {
                        time::sleep(delay).await;
                    }
                }
            }
        }
        if !ready {
            self.camera.stop();
            self.status = Status::DetectorUnavailable(last_error.clone());
            return Err(TryOnError::DetectorInit {
                attempts,
                reason: last_error,
            });
        }

        self.running = true;
        self.last_frame_id = None;
        self.status = if self.pipeline.garment().is_some() {
            Status::WaitingForCamera
        } else {
            Status::NoGarmentLoaded
        };
        Ok(())
    }

    /// Releases the camera and drops per-session smoothing state.
    pub fn stop(&mut self) {
        if self.running {
            info!("session stopped");
        }
        self.camera.stop();
        self.pipeline.reset_smoothing();
        self.running = false;
        self.last_frame_id = None;
        self.status = Status::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn canvas(&self) -> &RgbaImage {
        self.pipeline.canvas()
    }

    pub fn garment(&self) -> Option<&ActiveGarment> {
        self.pipeline.garment()
    }

    pub fn set_garment(&mut self, asset: GarmentAsset, category: GarmentCategory, sub_tag: Option<SubTag>) {
        info!(source = asset.source(), %category, "garment selected");
        self.pipeline
            .set_garment(ActiveGarment::new(asset, category, sub_tag));
        self.last_frame_id = None;
    }

    /// Decodes and selects a garment file. A failure leaves no garment selected.
    pub fn load_garment<P: AsRef<Path>>(
        &mut self,
        path: P,
        category: GarmentCategory,
        sub_tag: Option<SubTag>,
    ) -> TryOnResult<()> {
        let asset = GarmentAsset::load(path);
        self.accept_garment(asset, category, sub_tag)
    }

    pub fn load_garment_bytes(
        &mut self,
        source: &str,
        bytes: &[u8],
        category: GarmentCategory,
        sub_tag: Option<SubTag>,
    ) -> TryOnResult<()> {
        let asset = GarmentAsset::from_bytes(source, bytes);
        self.accept_garment(asset, category, sub_tag)
    }

    fn accept_garment(
        &mut self,
        asset: TryOnResult<GarmentAsset>,
        category: GarmentCategory,
        sub_tag: Option<SubTag>,
    ) -> TryOnResult<()> {
        match asset {
            Ok(asset) => {
                self.set_garment(asset, category, sub_tag);
                Ok(())
            }
            Err(e) => {
                warn!("{e}");
                self.clear_garment();
                Err(e)
            }
        }
    }

    pub fn clear_garment(&mut self) {
        self.pipeline.clear_garment();
        self.status = Status::NoGarmentLoaded;
        self.last_frame_id = None;
    }

    /// Host surface changed size; the next tick redraws even on the same frame.
    pub fn resize(&mut self, canvas_width: u32, canvas_height: u32, device_pixel_ratio: f32) {
        self.pipeline
            .resize(canvas_width, canvas_height, device_pixel_ratio);
        self.last_frame_id = None;
    }

    pub(crate) fn report_tick_failure(&mut self, error: &TryOnError) {
        self.status = Status::TickFailed(error.to_string());
    }

    /// One frame: de-duplicate, extract under the watchdog, place and draw.
    pub async fn tick(&mut self) -> TryOnResult<TickOutcome> {
        if !self.running {
            return Err(TryOnError::NotRunning);
        }

        let frame_id = self.camera.frame_id();
        if frame_id == 0 {
            self.status = Status::WaitingForCamera;
            return Ok(TickOutcome::NoFrame);
        }
        if self.last_frame_id == Some(frame_id) {
            return Ok(TickOutcome::Unchanged);
        }
        let Some(frame) = self.camera.latest_frame() else {
            self.status = Status::WaitingForCamera;
            return Ok(TickOutcome::NoFrame);
        };
        self.last_frame_id = Some(frame.id);

        if self.pipeline.garment().is_none() {
            let outcome = self.pipeline.render(&frame.image, &[]);
            self.status = outcome.status;
            return Ok(TickOutcome::Rendered { overlay: None });
        }

        let limit = Duration::from_millis(self.scheduler_config.extraction_timeout_ms);
        let poses = match time::timeout(limit, self.extractor.estimate_poses(&frame.image)).await {
            Ok(Ok(poses)) => poses,
            Ok(Err(e)) => return Err(TryOnError::DetectionTick(format!("{e:#}"))),
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, frame = frame.id, "pose extraction timed out");
                self.pipeline.render_video_only(&frame.image);
                self.status = Status::ExtractionTimedOut;
                return Ok(TickOutcome::Rendered { overlay: None });
            }
        };

        let outcome = self.pipeline.render(&frame.image, &poses);
        self.status = outcome.status;
        Ok(TickOutcome::Rendered {
            overlay: outcome.overlay,
        })
    }
}
