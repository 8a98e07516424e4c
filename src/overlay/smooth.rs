use nalgebra::{Vector2, Vector3};

use super::placement::OverlayRect;
use crate::config::SmoothConfig;

/// フレーム間で持ち越す服の変換
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedTransform {
    /// 矩形中心（キャンバス座標）
    pub position: Vector2<f32>,
    /// オイラー角 (x, y, z)。2D 描画では z のみ使う
    pub rotation: Vector3<f32>,
    /// (幅, 高さ)
    pub scale: Vector2<f32>,
}

impl SmoothedTransform {
    pub fn from_rect(rect: &OverlayRect) -> Self {
        let c = rect.center();
        Self {
            position: Vector2::new(c.x, c.y),
            rotation: Vector3::new(0.0, 0.0, rect.rotation),
            scale: Vector2::new(rect.width, rect.height),
        }
    }

    pub fn to_rect(&self) -> OverlayRect {
        let (w, h) = (self.scale.x, self.scale.y);
        OverlayRect {
            x: self.position.x - w / 2.0,
            y: self.position.y - h / 2.0,
            width: w,
            height: h,
            rotation: self.rotation.z,
        }
    }
}

/// current から target へ factor だけ寄せる。結果は両者の間に収まる
fn step(current: f32, target: f32, factor: f32) -> f32 {
    let v = current + (target - current) * factor;
    v.clamp(current.min(target), current.max(target))
}

/// 位置・各回転軸・スケールを独立に線形補間する
///
/// `new = current + (target - current) * factor`
pub fn smooth(current: &SmoothedTransform, target: &SmoothedTransform, factor: f32) -> SmoothedTransform {
    let f = factor.clamp(0.0, 1.0);
    SmoothedTransform {
        position: current.position.zip_map(&target.position, |a, b| step(a, b, f)),
        rotation: current.rotation.zip_map(&target.rotation, |a, b| step(a, b, f)),
        scale: current.scale.zip_map(&target.scale, |a, b| step(a, b, f)),
    }
}

/// EMAベースの服配置平滑化フィルタ
///
/// 最初のフレームはそのまま通す。セッション停止や服の変更時は reset する。
pub struct Smoother {
    factor: f32,
    prev: Option<SmoothedTransform>,
}

impl Smoother {
    pub fn new(factor: f32) -> Self {
        Self { factor, prev: None }
    }

    pub fn from_config(config: &SmoothConfig) -> Self {
        Self::new(config.factor)
    }

    pub fn apply(&mut self, target: SmoothedTransform) -> SmoothedTransform {
        let result = match self.prev {
            Some(prev) => smooth(&prev, &target, self.factor),
            None => target,
        };
        self.prev = Some(result);
        result
    }

    /// 矩形のまま平滑化する
    pub fn apply_rect(&mut self, rect: &OverlayRect) -> OverlayRect {
        self.apply(SmoothedTransform::from_rect(rect)).to_rect()
    }

    pub fn current(&self) -> Option<&SmoothedTransform> {
        self.prev.as_ref()
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn at(x: f32, y: f32) -> SmoothedTransform {
        SmoothedTransform {
            position: Vector2::new(x, y),
            rotation: Vector3::zeros(),
            scale: Vector2::new(1.0, 1.0),
        }
    }

    #[test]
    fn test_two_steps_toward_target() {
        let target = at(100.0, 100.0);
        let first = smooth(&at(0.0, 0.0), &target, 0.1);
        assert!(approx_eq_f32(first.position.x, 10.0, 1e-4));
        assert!(approx_eq_f32(first.position.y, 10.0, 1e-4));
        let second = smooth(&first, &target, 0.1);
        assert!(approx_eq_f32(second.position.x, 19.0, 1e-4));
        assert!(approx_eq_f32(second.position.y, 19.0, 1e-4));
    }

    #[test]
    fn test_axes_are_independent() {
        let current = SmoothedTransform {
            position: Vector2::new(0.0, 0.0),
            rotation: Vector3::new(0.0, 1.0, -1.0),
            scale: Vector2::new(100.0, 200.0),
        };
        let target = SmoothedTransform {
            position: Vector2::new(10.0, -10.0),
            rotation: Vector3::new(1.0, 1.0, 1.0),
            scale: Vector2::new(200.0, 100.0),
        };
        let r = smooth(&current, &target, 0.5);
        assert_eq!(r.position, Vector2::new(5.0, -5.0));
        assert_eq!(r.rotation, Vector3::new(0.5, 1.0, 0.0));
        assert_eq!(r.scale, Vector2::new(150.0, 150.0));
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut s = Smoother::new(0.1);
        let t = at(42.0, 7.0);
        assert_eq!(s.apply(t), t);
    }

    #[test]
    fn test_reset() {
        let mut s = Smoother::new(0.1);
        s.apply(at(0.0, 0.0));
        s.reset();
        assert!(s.current().is_none());
        // リセット後は次のフレームをそのまま通す
        let t = at(100.0, 100.0);
        assert_eq!(s.apply(t), t);
    }

    #[test]
    fn test_rect_round_trip() {
        let mut rect = OverlayRect::new(10.0, 20.0, 100.0, 50.0);
        rect.rotation = 0.25;
        let back = SmoothedTransform::from_rect(&rect).to_rect();
        assert!(approx_eq_f32(back.x, 10.0, 1e-5));
        assert!(approx_eq_f32(back.y, 20.0, 1e-5));
        assert!(approx_eq_f32(back.width, 100.0, 1e-5));
        assert!(approx_eq_f32(back.height, 50.0, 1e-5));
        assert_eq!(back.rotation, 0.25);
    }

    #[test]
    fn test_apply_rect_moves_gradually() {
        let mut s = Smoother::new(0.1);
        s.apply_rect(&OverlayRect::new(0.0, 0.0, 100.0, 100.0));
        let r = s.apply_rect(&OverlayRect::new(100.0, 0.0, 100.0, 100.0));
        assert!(approx_eq_f32(r.x, 10.0, 1e-4));
        assert!(approx_eq_f32(r.width, 100.0, 1e-4));
    }

    proptest! {
        #[test]
        fn prop_converges_without_overshoot(
            start in -1000.0f32..1000.0,
            target in -1000.0f32..1000.0,
            factor in 0.01f32..0.99,
        ) {
            let goal = at(target, target);
            let mut cur = at(start, start);
            let mut prev_gap = (target - start).abs();
            for _ in 0..50 {
                let next = smooth(&cur, &goal, factor);
                let x = next.position.x;
                // 現在値と目標値の間に留まる
                prop_assert!(x >= cur.position.x.min(target) && x <= cur.position.x.max(target));
                let gap = (target - x).abs();
                prop_assert!(gap <= prev_gap);
                // 1ステップで (1 - factor) 倍に縮む
                prop_assert!(gap <= prev_gap * (1.0 - factor) + 1e-3);
                prev_gap = gap;
                cur = next;
            }
            let expected = (target - start).abs() * (1.0 - factor).powi(50);
            prop_assert!(prev_gap <= expected + 0.1);
        }
    }
}
