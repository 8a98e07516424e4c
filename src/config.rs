use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::overlay::mapper::ScalingMode;
use crate::pose::PersonSelection;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub smoothing: SmoothConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlacementConfig {
    /// キーポイント採用の信頼度閾値（この値ちょうどは不採用）
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// 肩〜腰の高さに掛ける係数
    #[serde(default = "default_torso_stretch")]
    pub torso_stretch: f32,
    /// 腰が見えない時の 肩幅→服幅 係数
    #[serde(default = "default_shoulder_width_factor")]
    pub shoulder_width_factor: f32,
    /// 腰が見えない時の高さ係数
    #[serde(default = "default_shoulders_only_height_stretch")]
    pub shoulders_only_height_stretch: f32,
    /// 上半身の最小幅（肩幅に対する倍率）
    #[serde(default = "default_upper_width_floor")]
    pub upper_width_floor: f32,
    /// 肩ラインより上に出す割合（服の高さに対して）
    #[serde(default = "default_neckline_lift")]
    pub neckline_lift: f32,
    /// 腰〜膝/足首の高さに掛ける係数
    #[serde(default = "default_leg_stretch")]
    pub leg_stretch: f32,
    /// 下半身の最小幅（腰幅に対する倍率）
    #[serde(default = "default_lower_width_floor")]
    pub lower_width_floor: f32,
    /// 見た目調整用の横方向ストレッチ（上半身）
    #[serde(default = "default_upper_stretch")]
    pub upper_stretch: f32,
    /// 見た目調整用の横方向ストレッチ（下半身）
    #[serde(default = "default_lower_stretch")]
    pub lower_stretch: f32,
    /// 肩/腰ラインの傾きに合わせて回転させる
    #[serde(default)]
    pub follow_tilt: bool,
    #[serde(default)]
    pub person_selection: PersonSelection,
}

fn default_confidence_threshold() -> f32 { 0.5 }
fn default_torso_stretch() -> f32 { 1.15 }
fn default_shoulder_width_factor() -> f32 { 1.2 }
fn default_shoulders_only_height_stretch() -> f32 { 1.15 }
fn default_upper_width_floor() -> f32 { 1.2 }
fn default_neckline_lift() -> f32 { 0.1 }
fn default_leg_stretch() -> f32 { 1.2 }
fn default_lower_width_floor() -> f32 { 1.1 }
fn default_upper_stretch() -> f32 { 1.15 }
fn default_lower_stretch() -> f32 { 1.1 }

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            torso_stretch: default_torso_stretch(),
            shoulder_width_factor: default_shoulder_width_factor(),
            shoulders_only_height_stretch: default_shoulders_only_height_stretch(),
            upper_width_floor: default_upper_width_floor(),
            neckline_lift: default_neckline_lift(),
            leg_stretch: default_leg_stretch(),
            lower_width_floor: default_lower_width_floor(),
            upper_stretch: default_upper_stretch(),
            lower_stretch: default_lower_stretch(),
            follow_tilt: false,
            person_selection: PersonSelection::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmoothConfig {
    #[serde(default)]
    pub enabled: bool,
    /// 1フレームあたりに目標へ寄せる割合 (0.0〜1.0)
    #[serde(default = "default_smooth_factor")]
    pub factor: f32,
}

fn default_smooth_factor() -> f32 { 0.1 }

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            factor: default_smooth_factor(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewportConfig {
    #[serde(default)]
    pub scaling: ScalingMode,
    /// 論理キャンバス幅 (CSSピクセル相当)
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,
    /// 自撮り表示（左右反転）
    #[serde(default)]
    pub mirror_x: bool,
}

fn default_canvas_width() -> u32 { 640 }
fn default_canvas_height() -> u32 { 480 }
fn default_device_pixel_ratio() -> f32 { 1.0 }

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            scaling: ScalingMode::default(),
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            device_pixel_ratio: default_device_pixel_ratio(),
            mirror_x: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// 検出器初期化の試行回数
    #[serde(default = "default_init_attempts")]
    pub init_attempts: u32,
    #[serde(default = "default_init_retry_delay_ms")]
    pub init_retry_delay_ms: u64,
    /// tick 失敗後の待機時間
    #[serde(default = "default_tick_error_pause_ms")]
    pub tick_error_pause_ms: u64,
    /// 推論1回あたりのタイムアウト
    #[serde(default = "default_extraction_timeout_ms")]
    pub extraction_timeout_ms: u64,
}

fn default_target_fps() -> u32 { 30 }
fn default_init_attempts() -> u32 { 3 }
fn default_init_retry_delay_ms() -> u64 { 1000 }
fn default_tick_error_pause_ms() -> u64 { 3000 }
fn default_extraction_timeout_ms() -> u64 { 1000 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            init_attempts: default_init_attempts(),
            init_retry_delay_ms: default_init_retry_delay_ms(),
            tick_error_pause_ms: default_tick_error_pause_ms(),
            extraction_timeout_ms: default_extraction_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompositorConfig {
    /// 服に陰影グラデーションを乗せる
    #[serde(default = "default_shading")]
    pub shading: bool,
    /// 骨格をデバッグ描画する
    #[serde(default)]
    pub debug_skeleton: bool,
}

fn default_shading() -> bool { true }

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            shading: default_shading(),
            debug_skeleton: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
}

fn default_model_path() -> String { "models/movenet_lightning.onnx".to_string() }

impl Default for ModelConfig {
    fn default() -> Self {
        Self { path: default_model_path() }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 読めなければ警告を出してデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.placement;
        ensure!(
            (0.0..1.0).contains(&p.confidence_threshold),
            "placement.confidence_threshold must be in [0, 1)"
        );
        for (name, v) in [
            ("torso_stretch", p.torso_stretch),
            ("shoulder_width_factor", p.shoulder_width_factor),
            ("shoulders_only_height_stretch", p.shoulders_only_height_stretch),
            ("upper_width_floor", p.upper_width_floor),
            ("leg_stretch", p.leg_stretch),
            ("lower_width_floor", p.lower_width_floor),
            ("upper_stretch", p.upper_stretch),
            ("lower_stretch", p.lower_stretch),
        ] {
            ensure!(v.is_finite() && v > 0.0, "placement.{} must be positive", name);
        }
        ensure!(
            (0.0..1.0).contains(&p.neckline_lift),
            "placement.neckline_lift must be in [0, 1)"
        );
        ensure!(
            self.smoothing.factor > 0.0 && self.smoothing.factor <= 1.0,
            "smoothing.factor must be in (0, 1]"
        );
        ensure!(self.scheduler.target_fps > 0, "scheduler.target_fps must be positive");
        ensure!(self.scheduler.init_attempts > 0, "scheduler.init_attempts must be positive");
        ensure!(
            self.viewport.device_pixel_ratio.is_finite() && self.viewport.device_pixel_ratio > 0.0,
            "viewport.device_pixel_ratio must be positive"
        );
        ensure!(
            self.viewport.canvas_width > 0 && self.viewport.canvas_height > 0,
            "viewport canvas size must be non-zero"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.placement.confidence_threshold, 0.5);
        assert_eq!(config.placement.upper_width_floor, 1.2);
        assert_eq!(config.placement.lower_width_floor, 1.1);
        assert_eq!(config.scheduler.init_attempts, 3);
        assert_eq!(config.scheduler.tick_error_pause_ms, 3000);
        assert_eq!(config.smoothing.factor, 0.1);
        assert!(!config.smoothing.enabled);
        assert_eq!(config.viewport.scaling, ScalingMode::Direct);
        assert_eq!(config.placement.person_selection, PersonSelection::First);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_section() {
        let config: Config = toml::from_str(
            r#"
            [placement]
            upper_stretch = 1.3
            person_selection = "largest"

            [viewport]
            scaling = "aspect_fit"
            device_pixel_ratio = 2.0

            [smoothing]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.placement.upper_stretch, 1.3);
        assert_eq!(config.placement.lower_stretch, 1.1);
        assert_eq!(config.placement.person_selection, PersonSelection::Largest);
        assert_eq!(config.viewport.scaling, ScalingMode::AspectFit);
        assert_eq!(config.viewport.device_pixel_ratio, 2.0);
        assert!(config.smoothing.enabled);
        assert_eq!(config.smoothing.factor, 0.1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.smoothing.factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.placement.upper_stretch = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scheduler.target_fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.camera.width, 640);
    }
}
