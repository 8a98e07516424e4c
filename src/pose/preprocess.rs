use anyhow::Result;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use ndarray::Array4;

/// MoveNet用の入力サイズ
pub const MOVENET_INPUT_SIZE: u32 = 192;

/// カメラフレームを MoveNet用の入力テンソルに変換
///
/// - 192x192 にリサイズ（アスペクト比は保持しない）
/// - アルファは捨てて RGB のみ
/// - [1, 192, 192, 3] の f32 テンソルに変換 (0.0-255.0)
pub fn preprocess_for_movenet(frame: &RgbaImage) -> Result<Array4<f32>> {
    if frame.width() == 0 || frame.height() == 0 {
        anyhow::bail!("Empty frame received");
    }

    let resized = imageops::resize(frame, MOVENET_INPUT_SIZE, MOVENET_INPUT_SIZE, FilterType::Triangle);

    let size = MOVENET_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, y, x, 0]] = pixel[0] as f32;
        tensor[[0, y, x, 1]] = pixel[1] as f32;
        tensor[[0, y, x, 2]] = pixel[2] as f32;
    }

    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_tensor_shape_and_values() {
        let frame = RgbaImage::from_pixel(64, 48, Rgba([10, 20, 30, 255]));
        let tensor = preprocess_for_movenet(&frame).unwrap();
        assert_eq!(tensor.shape(), &[1, 192, 192, 3]);
        assert_eq!(tensor[[0, 100, 100, 0]], 10.0);
        assert_eq!(tensor[[0, 100, 100, 2]], 30.0);
    }

    #[test]
    fn test_empty_frame_rejected() {
        let frame = RgbaImage::new(0, 0);
        assert!(preprocess_for_movenet(&frame).is_err());
    }
}
