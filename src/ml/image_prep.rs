//! 画像の読み込みと前処理
//!
//! 画像ファイルをデコードし、正方形にリサイズしたうえで
//! (H, W, C) 順の浮動小数点テンソルに変換します。

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{ImageBuffer, Rgb, RgbImage};
use std::path::Path;

#[cfg(feature = "ml")]
use burn::tensor::{backend::Backend, Tensor};

use crate::error::HelperError;

/// 既定の画像サイズ
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// チャネル数（RGB）
pub const NUM_CHANNELS: usize = 3;

/// 前処理済み画像 (H, W, C)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    height: usize,
    width: usize,
    data: Vec<f32>,
    scaled: bool,
}

impl ImageTensor {
    /// (H, W, C) 順の画素値から作成
    pub fn from_hwc(height: usize, width: usize, data: Vec<f32>, scaled: bool) -> Result<Self> {
        let expected = height * width * NUM_CHANNELS;
        if data.len() != expected {
            anyhow::bail!(
                "pixel buffer has {} values, expected {} for {}x{}x{}",
                data.len(),
                expected,
                height,
                width,
                NUM_CHANNELS
            );
        }
        Ok(Self {
            height,
            width,
            data,
            scaled,
        })
    }

    /// [高さ, 幅, チャネル数]
    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, NUM_CHANNELS]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// 画素値が0〜1に縮尺されているか
    pub fn is_scaled(&self) -> bool {
        self.scaled
    }

    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
        if y >= self.height || x >= self.width || c >= NUM_CHANNELS {
            return None;
        }
        self.data.get((y * self.width + x) * NUM_CHANNELS + c).copied()
    }

    /// (C, H, W) 順に並べ替えた画素値
    pub fn to_chw(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        for c in 0..NUM_CHANNELS {
            for y in 0..self.height {
                for x in 0..self.width {
                    out.push(self.data[(y * self.width + x) * NUM_CHANNELS + c]);
                }
            }
        }
        out
    }

    /// 表示用の8bit RGB画像に戻す
    pub fn to_rgb_image(&self) -> RgbImage {
        let factor = if self.scaled { 255.0 } else { 1.0 };
        let raw: Vec<u8> = self
            .data
            .iter()
            .map(|v| (v * factor).round().clamp(0.0, 255.0) as u8)
            .collect();
        // 長さはfrom_hwc/load_prep_imageで保証済み
        ImageBuffer::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32))
    }

    /// Burnテンソル [H, W, C] に変換
    #[cfg(feature = "ml")]
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
        Tensor::<B, 1>::from_floats(self.data.as_slice(), device)
            .reshape([self.height, self.width, NUM_CHANNELS])
    }

    /// バッチ次元を付けたBurnテンソル [1, C, H, W] に変換
    #[cfg(feature = "ml")]
    pub fn to_batch<B: Backend>(&self, device: &B::Device) -> Tensor<B, 4> {
        let chw = self.to_chw();
        Tensor::<B, 1>::from_floats(chw.as_slice(), device)
            .reshape([1, NUM_CHANNELS, self.height, self.width])
    }
}

/// 画像を読み込み、`img_shape`×`img_shape`にリサイズしてテンソルに変換
///
/// # 引数
/// - `filename`: 画像ファイルのパス（形式は内容から判定）
/// - `img_shape`: リサイズ後の一辺のピクセル数
/// - `scale`: trueなら画素値を0〜1に、falseなら0〜255のまま
pub fn load_prep_image<P: AsRef<Path>>(filename: P, img_shape: u32, scale: bool) -> Result<ImageTensor> {
    let filename = filename.as_ref();
    if img_shape == 0 {
        return Err(HelperError::InvalidImageSize(img_shape).into());
    }

    let bytes = std::fs::read(filename)
        .with_context(|| format!("Failed to read image file: {:?}", filename))?;
    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("Failed to decode image: {:?}", filename))?
        .to_rgb32f();

    log::debug!(
        "Decoded {} ({}x{}), resizing to {}x{}",
        filename.display(),
        img.width(),
        img.height(),
        img_shape,
        img_shape
    );

    // バイリニア補間
    let resized = image::imageops::resize(&img, img_shape, img_shape, FilterType::Triangle);

    let factor = if scale { 1.0 } else { 255.0 };
    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| (v * factor).clamp(0.0, factor))
        .collect();

    ImageTensor::from_hwc(img_shape as usize, img_shape as usize, data, scale)
}

/// 既定値（224×224、0〜1に縮尺）で画像を読み込む
pub fn load_prep_image_default<P: AsRef<Path>>(filename: P) -> Result<ImageTensor> {
    load_prep_image(filename, DEFAULT_IMAGE_SIZE, true)
}

/// RGB画像を(H, W, C)の生画素値でテンソル化（リサイズなし）
pub fn image_to_tensor(img: &ImageBuffer<Rgb<u8>, Vec<u8>>, scale: bool) -> ImageTensor {
    let factor = if scale { 1.0 / 255.0 } else { 1.0 };
    let data = img.as_raw().iter().map(|&v| v as f32 * factor).collect();
    ImageTensor {
        height: img.height() as usize,
        width: img.width() as usize,
        data,
        scaled: scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 200])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_load_prep_image_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steak.png");
        write_test_image(&path, 64, 48);

        let tensor = load_prep_image(&path, 32, true).unwrap();
        assert_eq!(tensor.shape(), [32, 32, 3]);
        assert_eq!(tensor.data().len(), 32 * 32 * 3);
        assert!(tensor.data().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(tensor.is_scaled());
    }

    #[test]
    fn test_load_prep_image_unscaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pizza.jpg");
        write_test_image(&path, 20, 20);

        let tensor = load_prep_image(&path, 10, false).unwrap();
        assert_eq!(tensor.shape(), [10, 10, 3]);
        assert!(tensor.data().iter().all(|v| (0.0..=255.0).contains(v)));
        assert!(tensor.data().iter().any(|v| *v > 1.0));
    }

    #[test]
    fn test_format_detected_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("image.png");
        write_test_image(&png, 8, 8);
        let renamed = dir.path().join("image.data");
        std::fs::rename(&png, &renamed).unwrap();

        assert_eq!(load_prep_image(&renamed, 4, true).unwrap().shape(), [4, 4, 3]);
    }

    #[test]
    fn test_invalid_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steak.png");
        write_test_image(&path, 8, 8);

        let err = load_prep_image(&path, 0, true).unwrap_err();
        assert_eq!(err.downcast_ref::<HelperError>(), Some(&HelperError::InvalidImageSize(0)));
        assert!(load_prep_image(dir.path().join("missing.jpg"), 8, true).is_err());

        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"not an image").unwrap();
        assert!(load_prep_image(&garbage, 8, true).is_err());
    }

    #[test]
    fn test_layout_conversions() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
        let tensor = image_to_tensor(&img, true);

        assert_eq!(tensor.shape(), [1, 2, 3]);
        assert_eq!(tensor.get(0, 0, 0), Some(1.0));
        assert_eq!(tensor.get(0, 1, 2), Some(1.0));
        assert_eq!(tensor.get(1, 0, 0), None);
        assert_eq!(tensor.to_chw(), vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(tensor.to_rgb_image(), img);
    }

    #[test]
    fn test_from_hwc_rejects_wrong_length() {
        assert!(ImageTensor::from_hwc(2, 2, vec![0.0; 5], true).is_err());
    }
}
