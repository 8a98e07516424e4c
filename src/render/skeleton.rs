use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::pose::{KeypointIndex, Pose};

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント)
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 16] = [
    // 顔
    (KeypointIndex::LeftEar, KeypointIndex::LeftEye),
    (KeypointIndex::LeftEye, KeypointIndex::Nose),
    (KeypointIndex::Nose, KeypointIndex::RightEye),
    (KeypointIndex::RightEye, KeypointIndex::RightEar),
    // 上半身
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // 胴体
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    // 下半身
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

pub const KEYPOINT_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const SKELETON_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
pub const LOW_CONFIDENCE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

const KEYPOINT_RADIUS: i32 = 4;

/// キャンバス座標の姿勢を骨格として描く（デバッグ用）
pub fn draw_skeleton(canvas: &mut RgbaImage, pose: &Pose, threshold: f32) {
    for (start_idx, end_idx) in SKELETON_CONNECTIONS.iter() {
        let start = pose.get(*start_idx);
        let end = pose.get(*end_idx);
        if start.is_confident(threshold) && end.is_confident(threshold) {
            draw_line_segment_mut(canvas, (start.x, start.y), (end.x, end.y), SKELETON_COLOR);
        }
    }

    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    let margin = KEYPOINT_RADIUS as f32;
    // キャンバス外の点は描かない（巨大な座標で i32 があふれる）
    let visible = |x: f32, y: f32| x > -margin && y > -margin && x < w + margin && y < h + margin;

    for kp in pose.keypoints.iter().filter(|k| visible(k.x, k.y)) {
        let color = if kp.is_confident(threshold) {
            KEYPOINT_COLOR
        } else {
            LOW_CONFIDENCE_COLOR
        };
        draw_filled_circle_mut(canvas, (kp.x as i32, kp.y as i32), KEYPOINT_RADIUS, color);
    }
}
