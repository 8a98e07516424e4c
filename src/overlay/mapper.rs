//! Video pixel space → canvas backing-store pixel space.
//!
//! A [`CoordinateMapper`] is built once per frame from the current
//! [`ViewportGeometry`] and maps the whole pose, so every keypoint used in one
//! placement goes through the same regime.

use nalgebra::Point2;
use serde::Deserialize;

use crate::pose::{Keypoint, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    /// Independent x/y ratios, the video is stretched over the whole canvas.
    #[default]
    Direct,
    /// Video letterboxed inside the canvas at its own aspect ratio.
    AspectFit,
}

/// Sizes of the video source and the display surface.
///
/// `canvas_width`/`canvas_height` are logical (CSS-like) pixels; the backing
/// store is that size multiplied by `device_pixel_ratio`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    pub video_width: u32,
    pub video_height: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub device_pixel_ratio: f32,
}

impl ViewportGeometry {
    pub fn new(
        video_width: u32,
        video_height: u32,
        canvas_width: u32,
        canvas_height: u32,
        device_pixel_ratio: f32,
    ) -> Self {
        Self {
            video_width,
            video_height,
            canvas_width,
            canvas_height,
            device_pixel_ratio,
        }
    }

    /// Physical pixel size of the drawable buffer.
    pub fn backing_size(&self) -> (u32, u32) {
        let dpr = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        let w = (self.canvas_width as f32 * dpr).round().max(1.0) as u32;
        let h = (self.canvas_height as f32 * dpr).round().max(1.0) as u32;
        (w, h)
    }
}

/// Where the video frame lands on the backing store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoPlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale_x: f32,
    scale_y: f32,
    offset_x: f32,
    offset_y: f32,
    video_width: f32,
    video_height: f32,
    mirror_x: bool,
}

impl CoordinateMapper {
    pub fn new(viewport: &ViewportGeometry, mode: ScalingMode, mirror_x: bool) -> Self {
        let vw = viewport.video_width.max(1) as f32;
        let vh = viewport.video_height.max(1) as f32;
        let (bw, bh) = viewport.backing_size();
        let (bw, bh) = (bw as f32, bh as f32);

        let (scale_x, scale_y, offset_x, offset_y) = match mode {
            ScalingMode::Direct => (bw / vw, bh / vh, 0.0, 0.0),
            ScalingMode::AspectFit => {
                // fit in backing pixels == fit in logical pixels × DPR
                let fit = (bw / vw).min(bh / vh);
                let off_x = (bw - vw * fit) / 2.0;
                let off_y = (bh - vh * fit) / 2.0;
                (fit, fit, off_x, off_y)
            }
        };

        Self {
            scale_x,
            scale_y,
            offset_x,
            offset_y,
            video_width: vw,
            video_height: vh,
            mirror_x,
        }
    }

    pub fn to_canvas_space(&self, keypoint: &Keypoint) -> Point2<f32> {
        let x = if self.mirror_x {
            self.video_width - keypoint.x
        } else {
            keypoint.x
        };
        Point2::new(
            x * self.scale_x + self.offset_x,
            keypoint.y * self.scale_y + self.offset_y,
        )
    }

    /// Maps every keypoint; scores are kept as they are.
    pub fn map_pose(&self, pose: &Pose) -> Pose {
        let mut mapped = pose.clone();
        for kp in mapped.keypoints.iter_mut() {
            let p = self.to_canvas_space(kp);
            kp.x = p.x;
            kp.y = p.y;
        }
        mapped
    }

    pub fn video_placement(&self) -> VideoPlacement {
        VideoPlacement {
            x: self.offset_x,
            y: self.offset_y,
            width: self.video_width * self.scale_x,
            height: self.video_height * self.scale_y,
        }
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror_x
    }
}

/// One-off conversion of a single keypoint.
pub fn to_canvas_space(keypoint: &Keypoint, viewport: &ViewportGeometry, mode: ScalingMode) -> Point2<f32> {
    CoordinateMapper::new(viewport, mode, false).to_canvas_space(keypoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::KeypointIndex;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_direct_ratio_is_non_uniform() {
        let vp = ViewportGeometry::new(640, 480, 1280, 720, 1.0);
        let p = to_canvas_space(&Keypoint::new(320.0, 240.0, 1.0), &vp, ScalingMode::Direct);
        assert!(approx(p.x, 640.0));
        assert!(approx(p.y, 360.0));
    }

    #[test]
    fn test_direct_ratio_uses_backing_store() {
        let vp = ViewportGeometry::new(640, 480, 640, 480, 2.0);
        let p = to_canvas_space(&Keypoint::new(100.0, 50.0, 1.0), &vp, ScalingMode::Direct);
        assert!(approx(p.x, 200.0));
        assert!(approx(p.y, 100.0));
    }

    #[test]
    fn test_aspect_fit_letterbox_and_dpr() {
        // 4:3 の映像を 16:9 のキャンバスに収める → 左右に帯
        let vp = ViewportGeometry::new(640, 480, 800, 450, 2.0);
        assert_eq!(vp.backing_size(), (1600, 900));
        let mapper = CoordinateMapper::new(&vp, ScalingMode::AspectFit, false);

        // fit = min(1600/640, 900/480) = 1.875, 映像幅 1200, 帯 200
        let placement = mapper.video_placement();
        assert!(approx(placement.x, 200.0));
        assert!(approx(placement.y, 0.0));
        assert!(approx(placement.width, 1200.0));
        assert!(approx(placement.height, 900.0));

        let origin = mapper.to_canvas_space(&Keypoint::new(0.0, 0.0, 1.0));
        assert!(approx(origin.x, 200.0) && approx(origin.y, 0.0));
        let corner = mapper.to_canvas_space(&Keypoint::new(640.0, 480.0, 1.0));
        assert!(approx(corner.x, 1400.0) && approx(corner.y, 900.0));
    }

    #[test]
    fn test_aspect_fit_same_aspect_equals_direct() {
        let vp = ViewportGeometry::new(640, 480, 320, 240, 1.0);
        let kp = Keypoint::new(123.0, 321.0, 1.0);
        let a = to_canvas_space(&kp, &vp, ScalingMode::AspectFit);
        let d = to_canvas_space(&kp, &vp, ScalingMode::Direct);
        assert!(approx(a.x, d.x) && approx(a.y, d.y));
    }

    #[test]
    fn test_mirror_flips_x_only() {
        let vp = ViewportGeometry::new(640, 480, 640, 480, 1.0);
        let mapper = CoordinateMapper::new(&vp, ScalingMode::Direct, true);
        let p = mapper.to_canvas_space(&Keypoint::new(100.0, 50.0, 1.0));
        assert!(approx(p.x, 540.0));
        assert!(approx(p.y, 50.0));
    }

    #[test]
    fn test_map_pose_keeps_scores() {
        let vp = ViewportGeometry::new(100, 100, 200, 200, 1.0);
        let mapper = CoordinateMapper::new(&vp, ScalingMode::Direct, false);
        let mut pose = Pose::default();
        pose.set(KeypointIndex::LeftHip, Keypoint::new(10.0, 20.0, 0.7));
        let mapped = mapper.map_pose(&pose);
        assert_eq!(*mapped.get(KeypointIndex::LeftHip), Keypoint::new(20.0, 40.0, 0.7));
        assert_eq!(mapped.get(KeypointIndex::Nose).score, 0.0);
    }

    #[test]
    fn test_zero_video_size_does_not_divide_by_zero() {
        let vp = ViewportGeometry::new(0, 0, 640, 480, 1.0);
        let p = to_canvas_space(&Keypoint::new(1.0, 1.0, 1.0), &vp, ScalingMode::AspectFit);
        assert!(p.x.is_finite() && p.y.is_finite());
    }
}
