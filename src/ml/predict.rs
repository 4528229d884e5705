//! 単一画像の推論と予測結果の可視化

use anyhow::{Context, Result};
use plotters::prelude::*;
use std::path::Path;

#[cfg(feature = "ml")]
use burn::tensor::{backend::Backend, Tensor};

use crate::error::HelperError;
use crate::ml::image_prep::{load_prep_image, ImageTensor, DEFAULT_IMAGE_SIZE};

/// 表示時の画像の長辺（ピクセル）
const VIEW_SIZE: u32 = 448;

/// タイトル領域の高さ（ピクセル）
const TITLE_HEIGHT: u32 = 48;

/// 1枚の画像に対するモデル出力を返す
///
/// 戻り値はバッチ次元(=1)を除いた出力行。
/// 多クラス分類ならクラスごとのスコア、二値分類なら要素1個の確率。
pub trait Predictor {
    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>>;
}

/// 予測結果
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub class_name: String,
    /// モデルの生出力
    pub output: Vec<f32>,
}

impl Prediction {
    /// グラフタイトル
    pub fn title(&self) -> String {
        format!("Prediction: {}", self.class_name)
    }
}

/// 出力の最大値のインデックス（同値なら先頭）
fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if !(v > b) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// モデル出力からクラス名を決定
///
/// - 出力が2個以上: 最大値のインデックス
/// - 出力が1個: 二値分類として四捨五入した値
pub fn class_from_output(output: &[f32], class_names: &[String]) -> Result<(usize, String), HelperError> {
    let index = match output.len() {
        0 => return Err(HelperError::EmptyPrediction),
        1 => output[0].round().max(0.0) as usize,
        _ => argmax(output).ok_or(HelperError::EmptyPrediction)?,
    };

    class_names
        .get(index)
        .map(|name| (index, name.clone()))
        .ok_or(HelperError::ClassIndexOutOfRange {
            index,
            num_classes: class_names.len(),
        })
}

/// 前処理済み画像のクラスを予測
pub fn predict_class<M: Predictor + ?Sized>(
    model: &M,
    image: &ImageTensor,
    class_names: &[String],
) -> Result<Prediction> {
    let output = model.predict(image)?;
    let (class_index, class_name) = class_from_output(&output, class_names)?;

    log::debug!("Predicted class {} ({}) from {:?}", class_index, class_name, output);

    Ok(Prediction {
        class_index,
        class_name,
        output,
    })
}

/// 画像を読み込んで予測し、予測クラス名をタイトルにした画像をPNGで保存
pub fn pred_view<M, P, Q>(
    model: &M,
    filename: P,
    class_names: &[String],
    output_path: Q,
) -> Result<Prediction>
where
    M: Predictor + ?Sized,
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let img = load_prep_image(filename.as_ref(), DEFAULT_IMAGE_SIZE, true)?;
    let prediction = predict_class(model, &img, class_names)?;

    render_prediction(&img, &prediction.title(), output_path.as_ref())?;
    log::info!(
        "{} -> {} (saved to {})",
        filename.as_ref().display(),
        prediction.title(),
        output_path.as_ref().display()
    );

    Ok(prediction)
}

/// 画像とタイトルのみを描画（軸なし）
pub fn render_prediction(img: &ImageTensor, title: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
    }

    let [height, width, _] = img.shape();
    let zoom = (VIEW_SIZE / (height.max(width) as u32).max(1)).max(1);
    let view_w = width as u32 * zoom;
    let view_h = height as u32 * zoom;

    let root = BitMapBackend::new(path, (view_w, view_h + TITLE_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let area = root.titled(title, ("sans-serif", 28).into_font())?;

    let rgb = img.to_rgb_image();
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let color = RGBColor(pixel[0], pixel[1], pixel[2]);
        for dy in 0..zoom {
            for dx in 0..zoom {
                area.draw_pixel(((x * zoom + dx) as i32, (y * zoom + dy) as i32), &color)?;
            }
        }
    }

    root.present()
        .with_context(|| format!("Failed to write prediction image: {:?}", path))?;
    Ok(())
}

/// Burnモデルの順伝播
#[cfg(feature = "ml")]
pub trait ImageModel<B: Backend> {
    /// - `images`: バッチ画像 [batch_size, 3, size, size]
    /// - 戻り値: [batch_size, num_outputs]
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

/// BurnモデルをPredictorとして扱うアダプタ
#[cfg(feature = "ml")]
pub struct BurnPredictor<B: Backend, M> {
    model: M,
    device: B::Device,
}

#[cfg(feature = "ml")]
impl<B: Backend, M: ImageModel<B>> BurnPredictor<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[cfg(feature = "ml")]
impl<B: Backend, M: ImageModel<B>> Predictor for BurnPredictor<B, M> {
    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>> {
        let batch = image.to_batch::<B>(&self.device);
        let output = self.model.forward(batch);

        output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Failed to read prediction: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::image_prep::image_to_tensor;
    use image::{Rgb, RgbImage};

    struct FixedModel(Vec<f32>);

    impl Predictor for FixedModel {
        fn predict(&self, _image: &ImageTensor) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn class_names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn red_image() -> ImageTensor {
        image_to_tensor(&RgbImage::from_pixel(4, 4, Rgb([230, 10, 10])), true)
    }

    #[test]
    fn test_multiclass_uses_argmax() {
        let model = FixedModel(vec![0.1, 0.7, 0.2]);
        let names = class_names(&["pizza", "steak", "sushi"]);

        let prediction = predict_class(&model, &red_image(), &names).unwrap();
        assert_eq!(prediction.class_index, 1);
        assert_eq!(prediction.title(), "Prediction: steak");
    }

    #[test]
    fn test_argmax_ties_pick_first() {
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_binary_rounds_probability() {
        let names = class_names(&["pizza", "steak"]);
        assert_eq!(class_from_output(&[0.2], &names).unwrap().1, "pizza");
        assert_eq!(class_from_output(&[0.8], &names).unwrap().1, "steak");
    }

    #[test]
    fn test_prediction_errors() {
        let names = class_names(&["pizza", "steak"]);
        assert_eq!(class_from_output(&[], &names), Err(HelperError::EmptyPrediction));
        assert_eq!(
            class_from_output(&[0.0, 0.1, 0.9], &names),
            Err(HelperError::ClassIndexOutOfRange { index: 2, num_classes: 2 })
        );
    }

    #[test]
    fn test_pred_view_writes_titled_png() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("steak.png");
        RgbImage::from_pixel(30, 20, Rgb([120, 60, 30])).save(&image_path).unwrap();
        let output_path = dir.path().join("views/pred.png");

        let model = FixedModel(vec![0.2, 0.8]);
        let prediction = pred_view(&model, &image_path, &class_names(&["pizza", "steak"]), &output_path).unwrap();

        assert_eq!(prediction.title(), "Prediction: steak");
        assert!(std::fs::metadata(&output_path).unwrap().len() > 0);
    }

    #[cfg(feature = "ml")]
    mod burn_adapter {
        use super::*;
        use burn_ndarray::{NdArray, NdArrayDevice};

        /// チャネルごとの平均値をそのままスコアにするモデル
        struct ChannelMean;

        impl<B: Backend> ImageModel<B> for ChannelMean {
            fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
                let [batch_size, channels, _, _] = images.dims();
                images.mean_dim(2).mean_dim(3).reshape([batch_size, channels])
            }
        }

        #[test]
        fn test_burn_predictor() {
            let predictor = BurnPredictor::<NdArray, _>::new(ChannelMean, NdArrayDevice::Cpu);
            let names = class_names(&["red", "green", "blue"]);

            let prediction = predict_class(&predictor, &red_image(), &names).unwrap();
            assert_eq!(prediction.class_name, "red");
            assert_eq!(prediction.output.len(), 3);
        }
    }
}
