use std::path::Path;

use image::{imageops, DynamicImage, RgbaImage};
use tracing::{debug, info};

use crate::error::{TryOnError, TryOnResult};

/// 不透明ピクセルの外接矩形（両端を含むピクセル座標）
///
/// 常に `right >= left` かつ `bottom >= top`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaBounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl AlphaBounds {
    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }
}

/// alpha > 0 のピクセルを全て含む最小矩形。完全に透明なら None
pub fn alpha_bounds(image: &RgbaImage) -> Option<AlphaBounds> {
    let mut bounds: Option<AlphaBounds> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => AlphaBounds { left: x, top: y, right: x, bottom: y },
            Some(b) => AlphaBounds {
                left: b.left.min(x),
                top: b.top.min(y),
                right: b.right.max(x),
                bottom: b.bottom.max(y),
            },
        });
    }
    bounds
}

/// アルファクロップ済みの服画像
///
/// 服を選んだ時に一度だけ作る。作成後は不変で、tick をまたいで共有してよい。
#[derive(Debug, Clone)]
pub struct GarmentAsset {
    source: String,
    image: RgbaImage,
    bounds: AlphaBounds,
}

impl GarmentAsset {
    /// 画像をネイティブ解像度で RGBA に展開し、不透明部分でクロップする。
    /// 完全に透明な画像はクロップせずそのまま使う。
    ///
    /// O(width × height) なのでフレームごとに呼ばないこと。
    pub fn preprocess(source: impl Into<String>, raw: DynamicImage) -> TryOnResult<Self> {
        let source = source.into();
        let rgba = raw.into_rgba8();
        let (w, h) = rgba.dimensions();
        if w == 0 || h == 0 {
            return Err(TryOnError::GarmentLoad {
                source_name: source,
                reason: "image has no pixels".to_string(),
            });
        }

        let (image, bounds) = match alpha_bounds(&rgba) {
            Some(b) if b.width() == w && b.height() == h => (rgba, b),
            Some(b) => {
                let cropped = imageops::crop_imm(&rgba, b.left, b.top, b.width(), b.height()).to_image();
                (cropped, b)
            }
            None => {
                debug!(%source, "garment is fully transparent, keeping it uncropped");
                let full = AlphaBounds { left: 0, top: 0, right: w - 1, bottom: h - 1 };
                (rgba, full)
            }
        };

        info!(
            %source,
            original = format!("{}x{}", w, h),
            cropped = format!("{}x{}", image.width(), image.height()),
            "garment preprocessed"
        );

        Ok(Self { source, image, bounds })
    }

    /// エンコード済みバイト列（PNG 等）から作る
    pub fn from_bytes(source: impl Into<String>, bytes: &[u8]) -> TryOnResult<Self> {
        let source = source.into();
        match image::load_from_memory(bytes) {
            Ok(raw) => Self::preprocess(source, raw),
            Err(e) => Err(TryOnError::GarmentLoad {
                source_name: source,
                reason: e.to_string(),
            }),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> TryOnResult<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        match image::open(path) {
            Ok(raw) => Self::preprocess(source, raw),
            Err(e) => Err(TryOnError::GarmentLoad {
                source_name: source,
                reason: e.to_string(),
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// クロップ後の生 RGBA バッファ
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// 元画像上でのクロップ範囲
    pub fn bounds(&self) -> AlphaBounds {
        self.bounds
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 幅 / 高さ
    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn transparent(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]))
    }

    #[test]
    fn test_alpha_bounds_minimal_box() {
        let mut img = transparent(20, 10);
        img.put_pixel(3, 2, Rgba([255, 0, 0, 255]));
        img.put_pixel(15, 7, Rgba([0, 255, 0, 1]));
        img.put_pixel(8, 4, Rgba([0, 0, 255, 128]));
        let b = alpha_bounds(&img).unwrap();
        assert_eq!(b, AlphaBounds { left: 3, top: 2, right: 15, bottom: 7 });
        assert_eq!(b.width(), 13);
        assert_eq!(b.height(), 6);
    }

    #[test]
    fn test_alpha_bounds_single_pixel() {
        let mut img = transparent(5, 5);
        img.put_pixel(4, 0, Rgba([1, 1, 1, 255]));
        let b = alpha_bounds(&img).unwrap();
        assert_eq!((b.width(), b.height()), (1, 1));
        assert!(b.right >= b.left && b.bottom >= b.top);
    }

    #[test]
    fn test_alpha_bounds_fully_transparent() {
        assert!(alpha_bounds(&transparent(10, 10)).is_none());
    }

    #[test]
    fn test_preprocess_crops_to_opaque_region() {
        let mut img = transparent(30, 40);
        for y in 10..20 {
            for x in 5..25 {
                img.put_pixel(x, y, Rgba([200, 100, 50, 255]));
            }
        }
        let asset = GarmentAsset::preprocess("shirt.png", DynamicImage::ImageRgba8(img)).unwrap();
        assert_eq!((asset.width(), asset.height()), (20, 10));
        assert_eq!(asset.pixels().len(), 20 * 10 * 4);
        assert_eq!(asset.image().get_pixel(0, 0), &Rgba([200, 100, 50, 255]));
        assert_eq!(asset.bounds(), AlphaBounds { left: 5, top: 10, right: 24, bottom: 19 });
        assert!((asset.aspect_ratio() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_fully_transparent_png_keeps_original() {
        let mut bytes = Vec::new();
        transparent(10, 10)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let asset = GarmentAsset::from_bytes("empty.png", &bytes).unwrap();
        assert_eq!((asset.width(), asset.height()), (10, 10));
        assert_eq!(asset.image(), &transparent(10, 10));
    }

    #[test]
    fn test_decode_failure_is_garment_load_error() {
        let err = GarmentAsset::from_bytes("broken.png", b"not a png").unwrap_err();
        assert!(matches!(err, TryOnError::GarmentLoad { .. }));
    }

    #[test]
    fn test_missing_file_is_garment_load_error() {
        let err = GarmentAsset::load("no/such/garment.png").unwrap_err();
        assert!(matches!(err, TryOnError::GarmentLoad { .. }));
    }
}
