use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use image::RgbaImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::extractor::{BlockingSlot, KeypointExtractor};
use super::keypoint::{Keypoint, KeypointIndex, Pose};
use super::preprocess::preprocess_for_movenet;

/// MoveNet を使用した姿勢検出器
pub struct PoseDetector {
    session: Session,
}

impl PoseDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load ONNX model")?;

        Ok(Self { session })
    }

    /// 前処理済みテンソルから姿勢を検出
    ///
    /// 入力: [1, 192, 192, 3] の f32 テンソル
    /// 出力: フレームのピクセル座標に戻した Pose (17キーポイント)
    pub fn detect(&mut self, input: Array4<f32>, frame_w: u32, frame_h: u32) -> Result<Pose> {
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input_tensor])
            .context("Inference failed")?;

        // MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)、座標は 0.0〜1.0
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .context("Failed to extract output tensor")?;

        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            let y = output[[0, 0, i, 0]] * frame_h as f32;
            let x = output[[0, 0, i, 1]] * frame_w as f32;
            *kp = Keypoint::new(x, y, output[[0, 0, i, 2]]);
        }

        Ok(Pose::new(keypoints))
    }
}

/// MoveNet (single pose) を `KeypointExtractor` として使うアダプタ
///
/// 推論は blocking スレッドで実行するので、スケジューラ側のタイムアウトが効く。
/// タイムアウトした推論は次の呼び出しで回収し、同時に走るのは常に 1 つだけ。
pub struct MoveNetExtractor {
    model_path: PathBuf,
    detector: Option<Arc<Mutex<PoseDetector>>>,
    inflight: BlockingSlot<Pose>,
}

impl MoveNetExtractor {
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: model_path.into(),
            detector: None,
            inflight: BlockingSlot::new(),
        }
    }
}

impl KeypointExtractor for MoveNetExtractor {
    async fn initialize(&mut self) -> Result<()> {
        let path = self.model_path.clone();
        let detector = tokio::task::spawn_blocking(move || PoseDetector::new(&path))
            .await
            .context("Model loader task panicked")??;
        info!(model = %self.model_path.display(), "MoveNet loaded");
        self.detector = Some(Arc::new(Mutex::new(detector)));
        Ok(())
    }

    async fn estimate_poses(&mut self, frame: &RgbaImage) -> Result<Vec<Pose>> {
        let detector = self
            .detector
            .clone()
            .context("Detector is not initialized")?;
        let (w, h) = frame.dimensions();
        // 前回の推論が残っていればそれを待つので、このフレームの入力は使われない
        let input = if self.inflight.is_busy() {
            None
        } else {
            Some(preprocess_for_movenet(frame)?)
        };

        let pose = self
            .inflight
            .run(move || {
                let input = input.context("No input for inference")?;
                let mut detector = detector
                    .lock()
                    .map_err(|_| anyhow::anyhow!("Detector lock poisoned"))?;
                detector.detect(input, w, h)
            })
            .await?;

        Ok(vec![pose])
    }
}
