//! Per-tick canvas redraw: camera frame, then garment, then optional debug.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::mapper::CoordinateMapper;
use super::placement::OverlayRect;
use crate::config::CompositorConfig;
use crate::garment::GarmentAsset;
use crate::pose::Pose;
use crate::render::skeleton::draw_skeleton;

const CLEAR_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Owns the canvas backing store. Only the scheduler's task mutates it.
pub struct Compositor {
    canvas: RgbaImage,
    shading: bool,
    debug_skeleton: bool,
}

impl Compositor {
    pub fn new(width: u32, height: u32, config: &CompositorConfig) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width.max(1), height.max(1), CLEAR_COLOR),
            shading: config.shading,
            debug_skeleton: config.debug_skeleton,
        }
    }

    /// Reallocates the backing store; contents are cleared.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (w, h) = (width.max(1), height.max(1));
        if self.canvas.dimensions() != (w, h) {
            self.canvas = RgbaImage::from_pixel(w, h, CLEAR_COLOR);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Clears, draws `frame` where the mapper puts the video, then the
    /// garment into `overlay` (pre-clamp rect, clipped by the canvas edges).
    pub fn composite(
        &mut self,
        frame: &RgbaImage,
        mapper: &CoordinateMapper,
        garment: Option<(&GarmentAsset, &OverlayRect)>,
    ) {
        self.clear();
        self.draw_video(frame, mapper);
        if let Some((asset, rect)) = garment {
            self.draw_garment(asset, rect);
        }
    }

    /// Skeleton of a pose already in canvas space, when enabled in config.
    pub fn draw_debug_pose(&mut self, canvas_pose: &Pose, threshold: f32) {
        if self.debug_skeleton {
            draw_skeleton(&mut self.canvas, canvas_pose, threshold);
        }
    }

    fn clear(&mut self) {
        for p in self.canvas.pixels_mut() {
            *p = CLEAR_COLOR;
        }
    }

    fn draw_video(&mut self, frame: &RgbaImage, mapper: &CoordinateMapper) {
        if frame.width() == 0 || frame.height() == 0 {
            return;
        }
        let place = mapper.video_placement();
        let w = place.width.round().max(1.0) as u32;
        let h = place.height.round().max(1.0) as u32;

        let mut scaled = if frame.dimensions() == (w, h) {
            frame.clone()
        } else {
            imageops::resize(frame, w, h, FilterType::Triangle)
        };
        if mapper.is_mirrored() {
            imageops::flip_horizontal_in_place(&mut scaled);
        }
        imageops::replace(
            &mut self.canvas,
            &scaled,
            place.x.round() as i64,
            place.y.round() as i64,
        );
    }

    /// Inverse-maps every covered canvas pixel into the garment image.
    fn draw_garment(&mut self, asset: &GarmentAsset, rect: &OverlayRect) {
        if !rect.is_finite() || rect.width < 1.0 || rect.height < 1.0 {
            return;
        }
        let (cw, ch) = self.canvas.dimensions();
        let garment = asset.image();
        let (gw, gh) = (garment.width() as f32, garment.height() as f32);

        let center = rect.center();
        let (sin, cos) = rect.rotation.sin_cos();
        let (half_w, half_h) = (rect.width / 2.0, rect.height / 2.0);

        // 回転後の外接矩形 ∩ キャンバス
        let ext_x = half_w * cos.abs() + half_h * sin.abs();
        let ext_y = half_w * sin.abs() + half_h * cos.abs();
        let x0 = (center.x - ext_x).floor().max(0.0) as u32;
        let y0 = (center.y - ext_y).floor().max(0.0) as u32;
        let x1 = ((center.x + ext_x).ceil().max(0.0) as u32).min(cw);
        let y1 = ((center.y + ext_y).ceil().max(0.0) as u32).min(ch);

        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - center.x;
                let dy = py as f32 + 0.5 - center.y;
                // 逆回転して矩形ローカル座標へ
                let lx = dx * cos + dy * sin + half_w;
                let ly = -dx * sin + dy * cos + half_h;
                if lx < 0.0 || ly < 0.0 || lx >= rect.width || ly >= rect.height {
                    continue;
                }
                let u = lx / rect.width;
                let v = ly / rect.height;
                let Some(src) = sample_bilinear(garment, u * gw - 0.5, v * gh - 0.5) else {
                    continue;
                };
                let shade = if self.shading { shading(u, v) } else { 1.0 };
                blend(self.canvas.get_pixel_mut(px, py), src, shade);
            }
        }
    }
}

/// Cosmetic curvature: darker toward the side seams and slightly toward the hem.
fn shading(u: f32, v: f32) -> f32 {
    let side = 2.0 * u - 1.0;
    (1.0 - 0.22 * side * side) * (1.0 - 0.08 * v)
}

/// Premultiplied bilinear sample. Returns straight RGBA in 0..=1, or None
/// where the garment is fully transparent.
fn sample_bilinear(img: &RgbaImage, x: f32, y: f32) -> Option<[f32; 4]> {
    let max_x = img.width() as i64 - 1;
    let max_y = img.height() as i64 - 1;
    let fx = x.floor();
    let fy = y.floor();
    let tx = x - fx;
    let ty = y - fy;

    let mut acc = [0.0f32; 4];
    for (oy, wy) in [(0i64, 1.0 - ty), (1, ty)] {
        for (ox, wx) in [(0i64, 1.0 - tx), (1, tx)] {
            let w = wx * wy;
            if w <= 0.0 {
                continue;
            }
            let sx = (fx as i64 + ox).clamp(0, max_x) as u32;
            let sy = (fy as i64 + oy).clamp(0, max_y) as u32;
            let p = img.get_pixel(sx, sy);
            let a = p[3] as f32 / 255.0;
            acc[0] += p[0] as f32 / 255.0 * a * w;
            acc[1] += p[1] as f32 / 255.0 * a * w;
            acc[2] += p[2] as f32 / 255.0 * a * w;
            acc[3] += a * w;
        }
    }

    if acc[3] <= f32::EPSILON {
        return None;
    }
    Some([acc[0] / acc[3], acc[1] / acc[3], acc[2] / acc[3], acc[3].min(1.0)])
}

fn blend(dst: &mut Rgba<u8>, src: [f32; 4], shade: f32) {
    let a = src[3];
    for c in 0..3 {
        let s = (src[c] * shade).clamp(0.0, 1.0) * 255.0;
        let d = dst[c] as f32;
        dst[c] = (s * a + d * (1.0 - a)).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = 255;
}
