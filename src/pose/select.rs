use serde::Deserialize;

use super::keypoint::Pose;

/// 複数人検出時にどの姿勢を採用するか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonSelection {
    /// 推定器が返した先頭の結果
    #[default]
    First,
    /// 有効キーポイントの外接矩形が最大の人物
    Largest,
}

/// BBox（ビデオピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// 閾値を超えるキーポイントの min/max から BBox を返す。
/// 有効なキーポイントが2個未満なら None。
pub fn bbox_from_keypoints(pose: &Pose, threshold: f32) -> Option<BBox> {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut count = 0u32;

    for kp in pose.keypoints.iter().filter(|k| k.is_confident(threshold)) {
        min_x = min_x.min(kp.x);
        min_y = min_y.min(kp.y);
        max_x = max_x.max(kp.x);
        max_y = max_y.max(kp.y);
        count += 1;
    }

    if count < 2 {
        return None;
    }

    Some(BBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

/// 検出結果から一人分の姿勢を選ぶ。空なら None
pub fn select_person(poses: &[Pose], policy: PersonSelection, threshold: f32) -> Option<&Pose> {
    match policy {
        PersonSelection::First => poses.first(),
        PersonSelection::Largest => poses
            .iter()
            .map(|p| {
                let area = bbox_from_keypoints(p, threshold).map_or(0.0, |b| b.area());
                (p, area)
            })
            // 同面積なら先に来た方を残す
            .fold(None, |best: Option<(&Pose, f32)>, (p, area)| match best {
                Some((_, best_area)) if best_area >= area => best,
                _ => Some((p, area)),
            })
            .map(|(p, _)| p),
    }
}
