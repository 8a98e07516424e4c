use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use image::RgbaImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};
use tracing::{debug, info, warn};

use super::{CameraSource, Frame};
use crate::config::CameraConfig;

/// OpenCVを使用したカメラキャプチャ
pub struct OpenCvCamera {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    /// 解像度を指定してカメラを開く
    pub fn open(index: i32, width: u32, height: u32) -> Result<Self> {
        let mut capture =
            VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32).context("Failed to open camera")?;

        if !capture.is_opened()? {
            anyhow::bail!("Camera {} is not available", index);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        info!(index, width = actual_width, height = actual_height, "camera opened");

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込み RGBA に変換する
    pub fn read_frame(&mut self) -> Result<RgbaImage> {
        let mut frame = Mat::default();
        self.capture.read(&mut frame).context("Failed to read frame")?;
        if frame.empty() {
            anyhow::bail!("Empty frame received");
        }
        mat_to_rgba(&frame)
    }
}

/// BGR Mat → RgbaImage
fn mat_to_rgba(frame: &Mat) -> Result<RgbaImage> {
    let mut rgba = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgba, imgproc::COLOR_BGR2RGBA)?;
    let (w, h) = (rgba.cols() as u32, rgba.rows() as u32);
    let data = rgba.data_bytes()?.to_vec();
    RgbaImage::from_raw(w, h, data).context("Frame buffer size mismatch")
}

/// 別スレッドでカメラキャプチャを行い、最新フレームを提供する
#[derive(Default)]
pub struct ThreadedCamera {
    latest: Arc<Mutex<Option<Arc<RgbaImage>>>>,
    frame_id: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    width: u32,
    height: u32,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraSource for ThreadedCamera {
    fn start(&mut self, config: &CameraConfig) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let mut camera = OpenCvCamera::open(config.index, config.width, config.height)?;
        (self.width, self.height) = camera.resolution();

        let latest = self.latest.clone();
        let frame_id = self.frame_id.clone();
        let running = self.running.clone();
        running.store(true, Ordering::Release);

        let handle = thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    match camera.read_frame() {
                        Ok(frame) => {
                            if let Ok(mut slot) = latest.lock() {
                                *slot = Some(Arc::new(frame));
                            }
                            frame_id.fetch_add(1, Ordering::Release);
                        }
                        Err(e) => debug!("frame read failed: {e:#}"),
                    }
                }
                debug!("capture thread exiting");
            })
            .context("Failed to spawn capture thread")?;
        self.handle = Some(handle);
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Acquire)
    }

    /// 初回フレーム到着前のみNone
    fn latest_frame(&self) -> Option<Frame> {
        let slot = self.latest.lock().ok()?;
        let image = slot.as_ref()?.clone();
        Some(Frame {
            id: self.frame_id(),
            image,
        })
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("capture thread panicked");
            }
            info!("camera released");
        }
        if let Ok(mut slot) = self.latest.lock() {
            *slot = None;
        }
    }
}

impl Drop for ThreadedCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
