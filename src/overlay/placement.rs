use nalgebra::Point2;
use thiserror::Error;

use crate::config::PlacementConfig;
use crate::garment::{GarmentCategory, SubTag};
use crate::pose::{Keypoint, KeypointIndex, Pose};

/// 服を描画する矩形（キャンバスのバックバッファ座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// 矩形中心まわりの回転（ラジアン）
    pub rotation: f32,
}

impl OverlayRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height, rotation: 0.0 }
    }

    pub fn center(&self) -> Point2<f32> {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.rotation.is_finite()
    }

    /// キャンバス端で切り詰める。アスペクト比の再計算はしない。
    ///
    /// 既に範囲内の矩形はそのまま返す。
    pub fn clamp_to(&self, canvas_width: f32, canvas_height: f32) -> Self {
        if !self.is_finite() {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }
        let (x, width) = clamp_span(self.x, self.width, canvas_width.max(0.0));
        let (y, height) = clamp_span(self.y, self.height, canvas_height.max(0.0));
        Self { x, y, width, height, rotation: self.rotation }
    }
}

/// 1軸分の切り詰め。範囲内なら入力を一切変更しない
fn clamp_span(start: f32, len: f32, limit: f32) -> (f32, f32) {
    let mut start = start;
    let mut len = len.max(0.0);
    if start < 0.0 {
        len = (len + start).max(0.0);
        start = 0.0;
    }
    if start > limit {
        start = limit;
        len = 0.0;
    }
    if start + len > limit {
        len = (limit - start).max(0.0);
        // 丸めで start + len が limit を 1ulp 超えることがある
        while len > 0.0 && start + len > limit {
            len = f32::from_bits(len.to_bits() - 1);
        }
    }
    (start, len)
}

/// 配置が求まらなかった理由。フレーム単位の通常の結果でありエラー伝播はしない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("upper body not detected")]
    UpperBodyNotDetected,
    #[error("lower body not detected")]
    LowerBodyNotDetected,
    #[error("knees not detected (needed for shorts)")]
    KneesNotDetected,
    #[error("ankles not detected (needed for full-length garments)")]
    AnklesNotDetected,
    #[error("body geometry is degenerate")]
    DegenerateGeometry,
    #[error("garment aspect ratio is invalid")]
    InvalidAspectRatio,
}

/// どの計算経路で矩形を出したか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementBranch {
    /// 肩〜腰の胴体長から
    Torso,
    /// 腰が見えないので肩幅から
    ShouldersOnly,
    /// 腰〜膝
    Shorts,
    /// 腰〜足首
    FullLength,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// クランプ前の矩形
    pub rect: OverlayRect,
    pub branch: PlacementBranch,
    /// 最小幅で押し広げたか
    pub width_floor_applied: bool,
}

impl Placement {
    pub fn clamped(&self, canvas_width: f32, canvas_height: f32) -> OverlayRect {
        self.rect.clamp_to(canvas_width, canvas_height)
    }
}

/// 姿勢とカテゴリから服の配置矩形を求める
///
/// 上半身/アウター/下半身で共通の実装。カテゴリ差分は PlacementConfig の定数で表す。
#[derive(Debug, Clone)]
pub struct PlacementSolver {
    config: PlacementConfig,
}

impl PlacementSolver {
    pub fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// `pose` はキャンバス座標に変換済みであること
    pub fn compute_placement(
        &self,
        pose: &Pose,
        category: GarmentCategory,
        sub_tag: Option<SubTag>,
        garment_aspect: f32,
    ) -> Result<Placement, PlacementError> {
        if !(garment_aspect.is_finite() && garment_aspect > 0.0) {
            return Err(PlacementError::InvalidAspectRatio);
        }

        let placement = if category.is_upper() {
            self.place_upper(pose, garment_aspect)?
        } else {
            self.place_lower(pose, sub_tag, garment_aspect)?
        };

        let r = &placement.rect;
        if !r.is_finite() || r.width <= 0.0 || r.height <= 0.0 {
            return Err(PlacementError::DegenerateGeometry);
        }
        Ok(placement)
    }

    fn place_upper(&self, pose: &Pose, aspect: f32) -> Result<Placement, PlacementError> {
        let c = &self.config;
        let t = c.confidence_threshold;
        let left = pose.get(KeypointIndex::LeftShoulder);
        let right = pose.get(KeypointIndex::RightShoulder);
        let (cx, cy) = pose
            .confident_midpoint(KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder, t)
            .ok_or(PlacementError::UpperBodyNotDetected)?;
        let shoulder_width = (left.x - right.x).abs();

        // 腰が肩より上に来るような姿勢は胴体長が使えないので肩幅から
        let torso = pose
            .confident_midpoint(KeypointIndex::LeftHip, KeypointIndex::RightHip, t)
            .map(|(_, hip_y)| hip_y - cy)
            .filter(|torso| *torso > 0.0);

        let (mut width, mut height, branch) = match torso {
            Some(torso) => {
                let height = torso * c.torso_stretch;
                (height * aspect, height, PlacementBranch::Torso)
            }
            None => {
                let width = shoulder_width * c.shoulder_width_factor;
                let height = width / aspect * c.shoulders_only_height_stretch;
                (width, height, PlacementBranch::ShouldersOnly)
            }
        };

        width *= c.upper_stretch;

        let floor = shoulder_width * c.upper_width_floor;
        let width_floor_applied = width < floor;
        if width_floor_applied {
            width = floor;
            height = width / aspect;
        }

        let mut rect = OverlayRect::new(cx - width / 2.0, cy - height * c.neckline_lift, width, height);
        if c.follow_tilt {
            rect.rotation = line_angle(left, right);
        }

        Ok(Placement { rect, branch, width_floor_applied })
    }

    fn place_lower(
        &self,
        pose: &Pose,
        sub_tag: Option<SubTag>,
        aspect: f32,
    ) -> Result<Placement, PlacementError> {
        let c = &self.config;
        let t = c.confidence_threshold;
        let left = pose.get(KeypointIndex::LeftHip);
        let right = pose.get(KeypointIndex::RightHip);
        let (cx, cy) = pose
            .confident_midpoint(KeypointIndex::LeftHip, KeypointIndex::RightHip, t)
            .ok_or(PlacementError::LowerBodyNotDetected)?;
        let hip_width = (left.x - right.x).abs();

        let (lower_y, branch) = match sub_tag {
            Some(SubTag::Shorts) => {
                let (_, y) = pose
                    .confident_midpoint(KeypointIndex::LeftKnee, KeypointIndex::RightKnee, t)
                    .ok_or(PlacementError::KneesNotDetected)?;
                (y, PlacementBranch::Shorts)
            }
            None => {
                let (_, y) = pose
                    .confident_midpoint(KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle, t)
                    .ok_or(PlacementError::AnklesNotDetected)?;
                (y, PlacementBranch::FullLength)
            }
        };

        let mut height = (lower_y - cy) * c.leg_stretch;
        if height <= 0.0 {
            return Err(PlacementError::DegenerateGeometry);
        }
        let mut width = height * aspect * c.lower_stretch;

        let floor = hip_width * c.lower_width_floor;
        let width_floor_applied = width < floor;
        if width_floor_applied {
            width = floor;
            height = width / aspect;
        }

        let mut rect = OverlayRect::new(cx - width / 2.0, cy, width, height);
        if c.follow_tilt {
            rect.rotation = line_angle(left, right);
        }

        Ok(Placement { rect, branch, width_floor_applied })
    }
}

/// 左右ペアを結ぶ線の傾き。水平なら 0
fn line_angle(a: &Keypoint, b: &Keypoint) -> f32 {
    let (from, to) = if a.x <= b.x { (a, b) } else { (b, a) };
    (to.y - from.y).atan2(to.x - from.x)
}
