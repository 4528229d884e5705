//! 混同行列の計算と描画

use anyhow::{Context, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{check_label_lengths, HelperError};

/// 保存時のファイル名
pub const CONFUSION_MATRIX_FILE: &str = "Confusion_matrix.png";

/// セル文字色（閾値以下）
const NAVY: RGBColor = RGBColor(0, 0, 128);

/// カラーバーの幅（ピクセル）
const COLORBAR_WIDTH: u32 = 110;

/// これより長いx軸ラベルは回転して描く
const ROTATE_LABEL_CHARS: usize = 3;

/// Bluesカラーマップの基準色（薄い→濃い）
const BLUES: [(u8, u8, u8); 9] = [
    (247, 251, 255),
    (222, 235, 247),
    (198, 219, 239),
    (158, 202, 225),
    (107, 174, 214),
    (66, 146, 198),
    (33, 113, 181),
    (8, 81, 156),
    (8, 48, 107),
];

/// 混同行列
///
/// `counts[i][j]`は正解ラベル`labels[i]`を`labels[j]`と予測したサンプル数。
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix<T> {
    labels: Vec<T>,
    counts: Vec<Vec<u64>>,
}

impl<T: Ord + Clone> ConfusionMatrix<T> {
    /// 正解ラベルと予測ラベルから作成
    ///
    /// ラベルは両配列に現れる値の昇順です。
    pub fn from_labels(y_true: &[T], y_pred: &[T]) -> Result<Self, HelperError> {
        check_label_lengths(y_true, y_pred)?;

        let labels: Vec<T> = y_true
            .iter()
            .chain(y_pred)
            .cloned()
            .collect::<BTreeSet<T>>()
            .into_iter()
            .collect();

        let n = labels.len();
        let mut counts = vec![vec![0u64; n]; n];
        for (t, p) in y_true.iter().zip(y_pred) {
            // labelsは両配列の値をすべて含む
            if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
                counts[i][j] += 1;
            }
        }

        Ok(Self { labels, counts })
    }
}

impl<T> ConfusionMatrix<T> {
    pub fn labels(&self) -> &[T] {
        &self.labels
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, i: usize, j: usize) -> u64 {
        self.counts[i][j]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// 行ごとの合計（正解ラベルごとのサンプル数）
    pub fn row_sums(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// 列ごとの合計（予測ラベルごとのサンプル数）
    pub fn col_sums(&self) -> Vec<u64> {
        let n = self.n_classes();
        (0..n).map(|j| self.counts.iter().map(|row| row[j]).sum()).collect()
    }

    pub fn max(&self) -> u64 {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }

    pub fn min(&self) -> u64 {
        self.counts.iter().flatten().copied().min().unwrap_or(0)
    }

    /// 行方向に正規化した割合
    ///
    /// 合計0の行はすべて0になります。
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let sum: u64 = row.iter().sum();
                row.iter()
                    .map(|&c| if sum == 0 { 0.0 } else { c as f64 / sum as f64 })
                    .collect()
            })
            .collect()
    }

    /// 文字色を切り替える閾値
    pub fn threshold(&self) -> f64 {
        (self.max() + self.min()) as f64 / 2.0
    }

    /// 閾値を超える（濃い背景の）セルか
    pub fn is_dark_cell(&self, i: usize, j: usize) -> bool {
        self.get(i, j) as f64 > self.threshold()
    }

    /// セルに表示する文字列
    pub fn cell_text(&self, i: usize, j: usize, norm: bool) -> String {
        if norm {
            let sum: u64 = self.counts[i].iter().sum();
            let pct = if sum == 0 { 0.0 } else { self.get(i, j) as f64 / sum as f64 * 100.0 };
            format!("{} ({:.1}%)", self.get(i, j), pct)
        } else {
            format!("{}", self.get(i, j))
        }
    }
}

/// 混同行列の描画オプション
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrixOptions {
    /// 目盛りに使うクラス名（Noneなら0からの整数）
    pub classes: Option<Vec<String>>,
    /// 画像サイズ（ピクセル）
    pub figsize: (u32, u32),
    pub text_size: u32,
    /// セルに割合も表示するか
    pub norm: bool,
    /// 画像を保存するか
    pub savefig: bool,
    pub output_dir: PathBuf,
}

impl Default for ConfusionMatrixOptions {
    fn default() -> Self {
        Self {
            classes: None,
            figsize: (1000, 1000),
            text_size: 15,
            norm: false,
            savefig: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ConfusionMatrixOptions {
    /// 目盛りラベルを決定
    pub fn tick_labels(&self, n_classes: usize) -> Result<Vec<String>, HelperError> {
        match &self.classes {
            Some(classes) if classes.len() != n_classes => Err(HelperError::ClassCountMismatch {
                given: classes.len(),
                expected: n_classes,
            }),
            Some(classes) => Ok(classes.clone()),
            None => Ok((0..n_classes).map(|i| i.to_string()).collect()),
        }
    }
}

/// 混同行列の作成結果
#[derive(Debug, Clone)]
pub struct ConfusionMatrixReport<T> {
    pub matrix: ConfusionMatrix<T>,
    /// 保存した画像のパス（`savefig`がfalseならNone）
    pub figure_path: Option<PathBuf>,
}

/// Bluesカラーマップ（`t`は0〜1）
pub fn blues(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (BLUES.len() - 1) as f64;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(BLUES.len() - 1);
    let frac = scaled - lo as f64;

    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    let (a, b) = (BLUES[lo], BLUES[hi]);
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// 混同行列を作成し、ラベル付きのヒートマップとして描画
///
/// `options.savefig`がtrueなら`output_dir/Confusion_matrix.png`に保存します。
///
/// # 使用例
/// ```no_run
/// use vision_helpers_lib::metrics::{create_confusion_matrix, ConfusionMatrixOptions};
///
/// let options = ConfusionMatrixOptions {
///     classes: Some(vec!["pizza".into(), "steak".into()]),
///     savefig: true,
///     ..Default::default()
/// };
/// let report = create_confusion_matrix(&[0, 1, 1], &[0, 1, 0], &options).unwrap();
/// assert_eq!(report.matrix.get(1, 0), 1);
/// ```
pub fn create_confusion_matrix<T: Ord + Clone>(
    y_true: &[T],
    y_pred: &[T],
    options: &ConfusionMatrixOptions,
) -> Result<ConfusionMatrixReport<T>> {
    let matrix = ConfusionMatrix::from_labels(y_true, y_pred)?;
    let labels = options.tick_labels(matrix.n_classes())?;

    let figure_path = if options.savefig {
        let path = options.output_dir.join(CONFUSION_MATRIX_FILE);
        render_confusion_matrix(&matrix, &labels, options, &path)?;
        log::info!("Saved confusion matrix to {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(ConfusionMatrixReport { matrix, figure_path })
}

/// 混同行列をPNGに描画
pub fn render_confusion_matrix<T>(
    matrix: &ConfusionMatrix<T>,
    labels: &[String],
    options: &ConfusionMatrixOptions,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
    }

    let n = matrix.n_classes() as i32;
    let text_size = options.text_size.max(1) as i32;
    let (min, max) = (matrix.min() as f64, matrix.max() as f64);
    let color_of = |count: u64| {
        let span = max - min;
        blues(if span > 0.0 { (count as f64 - min) / span } else { 0.0 })
    };

    let root = BitMapBackend::new(path, options.figsize).into_drawing_area();
    root.fill(&WHITE)?;
    let (width, _) = root.dim_in_pixel();
    let (main_area, bar_area) = root.split_horizontally(width.saturating_sub(COLORBAR_WIDTH) as i32);

    let (rotate_x, bottom_area) = x_label_layout(labels, text_size);
    let left_area = label_extent(labels, text_size) + 50;

    let mut chart = ChartBuilder::on(&main_area)
        .caption("Confusion Matrix", ("sans-serif", text_size + 10).into_font())
        .margin(15)
        .x_label_area_size(bottom_area)
        .y_label_area_size(left_area)
        .build_cartesian_2d(0i32..n, 0i32..n)?;

    let (plot_w, plot_h) = chart.plotting_area().dim_in_pixel();
    let cell_w = plot_w as i32 / n.max(1);
    let cell_h = plot_h as i32 / n.max(1);

    let label_at = |i: i32| -> String {
        usize::try_from(i)
            .ok()
            .and_then(|i| labels.get(i))
            .cloned()
            .unwrap_or_default()
    };
    let x_tick = |v: &i32| label_at(*v);
    // 1行目を上に描くため、y座標vは行n-1-v
    let y_tick = |v: &i32| label_at(n - 1 - *v);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(n as usize + 1)
        .y_labels(n as usize + 1)
        .x_label_offset(cell_w / 2)
        .y_label_offset(-cell_h / 2)
        .x_label_formatter(&x_tick)
        .y_label_formatter(&y_tick)
        .x_desc("Predicted Label")
        .y_desc("True Label")
        .label_style(("sans-serif", text_size))
        .x_label_style(if rotate_x {
            ("sans-serif", text_size).into_font().transform(FontTransform::Rotate90)
        } else {
            ("sans-serif", text_size).into_font()
        })
        .axis_desc_style(("sans-serif", text_size + 2))
        .draw()?;

    let cells: Vec<(i32, i32, u64)> = (0..matrix.n_classes())
        .flat_map(|i| (0..matrix.n_classes()).map(move |j| (i, j)))
        .map(|(i, j)| (i as i32, j as i32, matrix.get(i, j)))
        .collect();

    chart.draw_series(cells.iter().map(|&(i, j, count)| {
        Rectangle::new([(j, n - 1 - i), (j + 1, n - i)], color_of(count).filled())
    }))?;

    chart.draw_series(cells.iter().map(|&(i, j, _)| {
        let (row, col) = (i as usize, j as usize);
        let color = if matrix.is_dark_cell(row, col) { WHITE } else { NAVY };
        let style = ("sans-serif", text_size)
            .into_font()
            .color(&color)
            .pos(Pos::new(HPos::Center, VPos::Center));
        EmptyElement::at((j, n - i)) + Text::new(matrix.cell_text(row, col, options.norm), (cell_w / 2, cell_h / 2), style)
    }))?;

    draw_colorbar(&bar_area, min, max, text_size, bottom_area)?;

    root.present()
        .with_context(|| format!("Failed to write confusion matrix: {:?}", path))?;
    Ok(())
}

/// 最長ラベルのおおよその幅（ピクセル）
fn label_extent(labels: &[String], text_size: i32) -> i32 {
    let chars = labels.iter().map(|l| l.chars().count()).max().unwrap_or(1) as i32;
    chars * text_size * 2 / 3
}

/// x軸ラベルを回転するかと、下側ラベル領域の高さ
pub(crate) fn x_label_layout(labels: &[String], text_size: i32) -> (bool, i32) {
    let longest = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    if longest > ROTATE_LABEL_CHARS {
        (true, label_extent(labels, text_size) + text_size * 2 + 30)
    } else {
        (false, text_size * 3 + 30)
    }
}

fn draw_colorbar(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    min: f64,
    max: f64,
    text_size: i32,
    bottom_area: i32,
) -> Result<()> {
    const STEPS: usize = 64;
    let top = if max > min { max } else { min + 1.0 };

    let mut bar = ChartBuilder::on(area)
        .margin_top(text_size + 40)
        .margin_bottom(bottom_area + 15)
        .margin_right(10)
        .y_label_area_size(0)
        .right_y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, min..top)?;

    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .label_style(("sans-serif", (text_size * 3 / 4).max(8)))
        .draw()?;

    let step = (top - min) / STEPS as f64;
    bar.draw_series((0..STEPS).map(|k| {
        let v0 = min + step * k as f64;
        let t = (k as f64 + 0.5) / STEPS as f64;
        Rectangle::new([(0.0, v0), (1.0, v0 + step)], blues(t).filled())
    }))?;

    Ok(())
}
