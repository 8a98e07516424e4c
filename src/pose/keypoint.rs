use serde::{Deserialize, Serialize};

/// COCO 17 キーポイントインデックス (MoveNet と同じ並び)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

const NAMES: [&str; KeypointIndex::COUNT] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            1 => Some(Self::LeftEye),
            2 => Some(Self::RightEye),
            3 => Some(Self::LeftEar),
            4 => Some(Self::RightEar),
            5 => Some(Self::LeftShoulder),
            6 => Some(Self::RightShoulder),
            7 => Some(Self::LeftElbow),
            8 => Some(Self::RightElbow),
            9 => Some(Self::LeftWrist),
            10 => Some(Self::RightWrist),
            11 => Some(Self::LeftHip),
            12 => Some(Self::RightHip),
            13 => Some(Self::LeftKnee),
            14 => Some(Self::RightKnee),
            15 => Some(Self::LeftAnkle),
            16 => Some(Self::RightAnkle),
            _ => None,
        }
    }

    /// 解剖学的名称 (例: "left_shoulder")
    pub fn name(self) -> &'static str {
        NAMES[self as usize]
    }

    /// 名称からインデックスを引く。語彙外なら None
    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(Self::from_index)
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// X座標 (ビデオピクセル)
    pub x: f32,
    /// Y座標 (ビデオピクセル)
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }

    /// 信頼度が閾値を超えているか（閾値ちょうどは無効）
    ///
    /// 座標が非有限の場合も無効扱い。
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.score > threshold && self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            score: 0.0,
        }
    }
}

/// 外部の推定器が返す名前付きキーポイント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedKeypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// 17キーポイントからなる一人分の姿勢
///
/// 推定器が返さなかったキーポイントはスコア 0 で埋まっている。
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    /// 名前付きキーポイント列から構築。語彙外の名前は無視する
    pub fn from_named<'a, I>(named: I) -> Self
    where
        I: IntoIterator<Item = &'a NamedKeypoint>,
    {
        let mut pose = Self::default();
        for kp in named {
            if let Some(idx) = KeypointIndex::from_name(&kp.name) {
                pose.keypoints[idx as usize] = Keypoint::new(kp.x, kp.y, kp.score);
            }
        }
        pose
    }

    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    pub fn set(&mut self, index: KeypointIndex, keypoint: Keypoint) {
        self.keypoints[index as usize] = keypoint;
    }

    /// 左右ペアが両方とも閾値を超えていれば中点を返す
    pub fn confident_midpoint(
        &self,
        left: KeypointIndex,
        right: KeypointIndex,
        threshold: f32,
    ) -> Option<(f32, f32)> {
        let l = self.get(left);
        let r = self.get(right);
        if l.is_confident(threshold) && r.is_confident(threshold) {
            Some(((l.x + r.x) / 2.0, (l.y + r.y) / 2.0))
        } else {
            None
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_index_count() {
        assert_eq!(KeypointIndex::COUNT, 17);
        assert_eq!(NAMES.len(), KeypointIndex::COUNT);
    }

    #[test]
    fn test_keypoint_index_from_index() {
        assert_eq!(KeypointIndex::from_index(0), Some(KeypointIndex::Nose));
        assert_eq!(KeypointIndex::from_index(16), Some(KeypointIndex::RightAnkle));
        assert_eq!(KeypointIndex::from_index(17), None);
    }

    #[test]
    fn test_name_round_trip() {
        for i in 0..KeypointIndex::COUNT {
            let idx = KeypointIndex::from_index(i).unwrap();
            assert_eq!(KeypointIndex::from_name(idx.name()), Some(idx));
        }
        assert_eq!(KeypointIndex::from_name("left_tail"), None);
    }

    #[test]
    fn test_keypoint_threshold_is_strict() {
        assert!(Keypoint::new(1.0, 1.0, 0.51).is_confident(0.5));
        assert!(!Keypoint::new(1.0, 1.0, 0.5).is_confident(0.5));
        assert!(!Keypoint::new(f32::NAN, 1.0, 0.9).is_confident(0.5));
    }

    #[test]
    fn test_from_named_ignores_unknown() {
        let named = vec![
            NamedKeypoint { name: "left_hip".into(), x: 10.0, y: 20.0, score: 0.8 },
            NamedKeypoint { name: "tail".into(), x: 1.0, y: 1.0, score: 1.0 },
        ];
        let pose = Pose::from_named(&named);
        assert_eq!(*pose.get(KeypointIndex::LeftHip), Keypoint::new(10.0, 20.0, 0.8));
        assert_eq!(pose.keypoints.iter().filter(|k| k.score > 0.0).count(), 1);
    }

    #[test]
    fn test_confident_midpoint() {
        let mut pose = Pose::default();
        pose.set(KeypointIndex::LeftShoulder, Keypoint::new(100.0, 50.0, 0.9));
        pose.set(KeypointIndex::RightShoulder, Keypoint::new(200.0, 70.0, 0.9));
        assert_eq!(
            pose.confident_midpoint(KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder, 0.5),
            Some((150.0, 60.0))
        );
        pose.set(KeypointIndex::RightShoulder, Keypoint::new(200.0, 70.0, 0.4));
        assert!(pose
            .confident_midpoint(KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder, 0.5)
            .is_none());
    }
}
