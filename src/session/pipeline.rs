//! Synchronous half of a tick: poses in, composited canvas and status out.

use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::config::{Config, ViewportConfig};
use crate::garment::{GarmentAsset, GarmentCategory, SubTag};
use crate::overlay::{
    Compositor, CoordinateMapper, OverlayRect, PlacementSolver, Smoother, Status, ViewportGeometry,
};
use crate::pose::{select_person, PersonSelection, Pose};

/// Garment currently worn, as chosen in the catalog.
#[derive(Debug, Clone)]
pub struct ActiveGarment {
    pub asset: Arc<GarmentAsset>,
    pub category: GarmentCategory,
    pub sub_tag: Option<SubTag>,
}

impl ActiveGarment {
    pub fn new(asset: GarmentAsset, category: GarmentCategory, sub_tag: Option<SubTag>) -> Self {
        Self {
            asset: Arc::new(asset),
            category,
            sub_tag,
        }
    }
}

/// Result of drawing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    /// Clamped overlay rect, `None` when no garment was drawn.
    pub overlay: Option<OverlayRect>,
    pub status: Status,
}

pub struct OverlayPipeline {
    solver: PlacementSolver,
    smoother: Option<Smoother>,
    compositor: Compositor,
    viewport: ViewportConfig,
    selection: PersonSelection,
    garment: Option<ActiveGarment>,
}

impl OverlayPipeline {
    pub fn new(config: &Config) -> Self {
        let viewport = config.viewport.clone();
        let (w, h) = backing_size(&viewport);
        Self {
            solver: PlacementSolver::new(config.placement.clone()),
            smoother: config
                .smoothing
                .enabled
                .then(|| Smoother::from_config(&config.smoothing)),
            compositor: Compositor::new(w, h, &config.compositor),
            selection: config.placement.person_selection,
            viewport,
            garment: None,
        }
    }

    pub fn garment(&self) -> Option<&ActiveGarment> {
        self.garment.as_ref()
    }

    /// Swaps the garment and drops the carried transform.
    pub fn set_garment(&mut self, garment: ActiveGarment) {
        self.garment = Some(garment);
        self.reset_smoothing();
    }

    pub fn clear_garment(&mut self) {
        self.garment = None;
        self.reset_smoothing();
    }

    pub fn reset_smoothing(&mut self) {
        if let Some(s) = self.smoother.as_mut() {
            s.reset();
        }
    }

    /// The carried transform is in backing-store pixels, so it is dropped here.
    pub fn resize(&mut self, canvas_width: u32, canvas_height: u32, device_pixel_ratio: f32) {
        self.reset_smoothing();
        self.viewport.canvas_width = canvas_width;
        self.viewport.canvas_height = canvas_height;
        self.viewport.device_pixel_ratio = device_pixel_ratio;
        let (w, h) = backing_size(&self.viewport);
        self.compositor.resize(w, h);
        debug!(canvas_width, canvas_height, device_pixel_ratio, backing = ?(w, h), "viewport resized");
    }

    pub fn canvas(&self) -> &RgbaImage {
        self.compositor.canvas()
    }

    pub fn geometry(&self, video_width: u32, video_height: u32) -> ViewportGeometry {
        ViewportGeometry::new(
            video_width,
            video_height,
            self.viewport.canvas_width,
            self.viewport.canvas_height,
            self.viewport.device_pixel_ratio,
        )
    }

    fn mapper_for(&self, frame: &RgbaImage) -> CoordinateMapper {
        let geometry = self.geometry(frame.width(), frame.height());
        CoordinateMapper::new(&geometry, self.viewport.scaling, self.viewport.mirror_x)
    }

    /// Camera frame only, e.g. when extraction was skipped.
    pub fn render_video_only(&mut self, frame: &RgbaImage) {
        let mapper = self.mapper_for(frame);
        self.compositor.composite(frame, &mapper, None);
    }

    /// Mapper → solver → smoother → compositor for one frame.
    pub fn render(&mut self, frame: &RgbaImage, poses: &[Pose]) -> RenderOutcome {
        let mapper = self.mapper_for(frame);

        let Some(garment) = self.garment.clone() else {
            self.compositor.composite(frame, &mapper, None);
            return RenderOutcome {
                overlay: None,
                status: Status::NoGarmentLoaded,
            };
        };

        let threshold = self.solver.config().confidence_threshold;
        let Some(pose) = select_person(poses, self.selection, threshold) else {
            self.compositor.composite(frame, &mapper, None);
            return RenderOutcome {
                overlay: None,
                status: Status::NoPersonDetected,
            };
        };

        let canvas_pose = mapper.map_pose(pose);
        let placement = self.solver.compute_placement(
            &canvas_pose,
            garment.category,
            garment.sub_tag,
            garment.asset.aspect_ratio(),
        );

        let outcome = match placement {
            Ok(placement) => {
                let rect = match self.smoother.as_mut() {
                    Some(s) => s.apply_rect(&placement.rect),
                    None => placement.rect,
                };
                self.compositor
                    .composite(frame, &mapper, Some((garment.asset.as_ref(), &rect)));
                let (cw, ch) = self.compositor.size();
                RenderOutcome {
                    overlay: Some(rect.clamp_to(cw as f32, ch as f32)),
                    status: Status::Applied {
                        category: garment.category,
                        branch: placement.branch,
                    },
                }
            }
            Err(reason) => {
                debug!(%reason, category = %garment.category, "placement skipped");
                self.compositor.composite(frame, &mapper, None);
                RenderOutcome {
                    overlay: None,
                    status: Status::BodyPartMissing(reason),
                }
            }
        };

        self.compositor.draw_debug_pose(&canvas_pose, threshold);
        outcome
    }
}

fn backing_size(viewport: &ViewportConfig) -> (u32, u32) {
    ViewportGeometry::new(
        0,
        0,
        viewport.canvas_width,
        viewport.canvas_height,
        viewport.device_pixel_ratio,
    )
    .backing_size()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{PlacementBranch, PlacementError};
    use crate::pose::{Keypoint, KeypointIndex};
    use image::{DynamicImage, Rgba};

    fn config() -> Config {
        let mut config = Config::default();
        config.viewport.canvas_width = 320;
        config.viewport.canvas_height = 240;
        config.compositor.shading = false;
        config
    }

    fn shirt() -> ActiveGarment {
        let img = RgbaImage::from_pixel(40, 50, Rgba([200, 10, 10, 255]));
        let asset = GarmentAsset::preprocess("shirt.png", DynamicImage::ImageRgba8(img)).unwrap();
        ActiveGarment::new(asset, GarmentCategory::Upperwear, None)
    }

    fn frame() -> RgbaImage {
        RgbaImage::from_pixel(320, 240, Rgba([0, 0, 0, 255]))
    }

    fn make_pose(points: &[(KeypointIndex, f32, f32)]) -> Pose {
        let mut pose = Pose::default();
        for &(idx, x, y) in points {
            pose.set(idx, Keypoint::new(x, y, 0.9));
        }
        pose
    }

    fn upper_body() -> Pose {
        make_pose(&[
            (KeypointIndex::LeftShoulder, 100.0, 50.0),
            (KeypointIndex::RightShoulder, 200.0, 50.0),
            (KeypointIndex::LeftHip, 110.0, 200.0),
            (KeypointIndex::RightHip, 190.0, 200.0),
        ])
    }

    #[test]
    fn test_without_garment() {
        let mut p = OverlayPipeline::new(&config());
        let out = p.render(&frame(), &[upper_body()]);
        assert_eq!(out.status, Status::NoGarmentLoaded);
        assert!(out.overlay.is_none());
    }

    #[test]
    fn test_no_person() {
        let mut p = OverlayPipeline::new(&config());
        p.set_garment(shirt());
        let out = p.render(&frame(), &[]);
        assert_eq!(out.status, Status::NoPersonDetected);
    }

    #[test]
    fn test_applied_upperwear() {
        let mut p = OverlayPipeline::new(&config());
        p.set_garment(shirt());
        let out = p.render(&frame(), &[upper_body()]);
        assert_eq!(
            out.status,
            Status::Applied {
                category: GarmentCategory::Upperwear,
                branch: PlacementBranch::Torso
            }
        );
        let rect = out.overlay.unwrap();
        assert!(rect.x >= 0.0 && rect.y >= 0.0);
        assert!(rect.x + rect.width <= 320.0 && rect.y + rect.height <= 240.0);
        // 肩の中心付近に服が描かれている
        assert_eq!(*p.canvas().get_pixel(150, 100), Rgba([200, 10, 10, 255]));
    }

    #[test]
    fn test_shorts_without_knees() {
        let mut p = OverlayPipeline::new(&config());
        let img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let asset = GarmentAsset::preprocess("shorts.png", DynamicImage::ImageRgba8(img)).unwrap();
        p.set_garment(ActiveGarment::new(asset, GarmentCategory::Lowerwear, Some(SubTag::Shorts)));
        let out = p.render(&frame(), &[upper_body()]);
        assert_eq!(out.status, Status::BodyPartMissing(PlacementError::KneesNotDetected));
        assert!(out.overlay.is_none());
        assert_eq!(*p.canvas().get_pixel(150, 220), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_resize_applies_dpr() {
        let mut p = OverlayPipeline::new(&config());
        p.resize(200, 100, 2.0);
        assert_eq!(p.canvas().dimensions(), (400, 200));
    }

    #[test]
    fn test_smoothing_follows_gradually() {
        let mut cfg = config();
        cfg.smoothing.enabled = true;
        cfg.smoothing.factor = 0.5;
        let mut p = OverlayPipeline::new(&cfg);
        p.set_garment(shirt());

        let first = p.render(&frame(), &[upper_body()]).overlay.unwrap();
        let second = p.render(&frame(), &[shifted(20.0)]).overlay.unwrap();
        assert!((second.x - (first.x + 10.0)).abs() < 1e-3);
    }

    fn smoothing_config() -> Config {
        let mut cfg = config();
        cfg.smoothing.enabled = true;
        cfg.smoothing.factor = 0.1;
        cfg
    }

    fn shifted(dx: f32) -> Pose {
        let mut pose = upper_body();
        for kp in pose.keypoints.iter_mut() {
            kp.x += dx;
        }
        pose
    }

    /// 平滑化なしで pose を描いた時の矩形
    fn unsmoothed(cfg: &Config, pose: Pose) -> OverlayRect {
        let mut fresh = OverlayPipeline::new(cfg);
        fresh.set_garment(shirt());
        fresh.render(&frame(), &[pose]).overlay.unwrap()
    }

    #[test]
    fn test_resize_drops_smoothing_state() {
        let cfg = smoothing_config();
        let mut p = OverlayPipeline::new(&cfg);
        p.set_garment(shirt());
        p.render(&frame(), &[upper_body()]);

        p.resize(320, 240, 2.0);
        let after = p.render(&frame(), &[upper_body()]).overlay.unwrap();

        let mut hidpi = cfg.clone();
        hidpi.viewport.device_pixel_ratio = 2.0;
        assert_eq!(after, unsmoothed(&hidpi, upper_body()));
    }

    #[test]
    fn test_garment_change_drops_smoothing_state() {
        let cfg = smoothing_config();
        let mut p = OverlayPipeline::new(&cfg);
        p.set_garment(shirt());
        p.render(&frame(), &[upper_body()]);

        p.set_garment(shirt());
        let after = p.render(&frame(), &[shifted(30.0)]).overlay.unwrap();
        assert_eq!(after, unsmoothed(&cfg, shifted(30.0)));
    }

    #[test]
    fn test_smoothing_kept_without_reset() {
        let cfg = smoothing_config();
        let mut p = OverlayPipeline::new(&cfg);
        p.set_garment(shirt());
        p.render(&frame(), &[upper_body()]);

        let after = p.render(&frame(), &[shifted(30.0)]).overlay.unwrap();
        assert_ne!(after, unsmoothed(&cfg, shifted(30.0)));
    }
}
