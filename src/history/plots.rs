//! 学習曲線の描画

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::HelperError;
use crate::history::TrainingHistory;

/// 単体グラフの画像サイズ
const CURVE_SIZE: (u32, u32) = (640, 480);

/// 比較グラフの画像サイズ
const COMPARE_SIZE: (u32, u32) = (800, 800);

/// ファインチューニング開始エポックの既定値
pub const DEFAULT_INITIAL_EPOCHS: usize = 5;

const TRAIN_COLOR: RGBColor = RGBColor(31, 119, 180);
const VAL_COLOR: RGBColor = RGBColor(255, 127, 14);
const MARKER_COLOR: RGBColor = RGBColor(44, 160, 44);

/// 出力されたグラフのパス
#[derive(Debug, Clone, PartialEq)]
pub struct LossAccuracyPlots {
    pub loss_path: PathBuf,
    pub accuracy_path: PathBuf,
}

/// 凡例の位置
#[derive(Debug, Clone, Copy)]
enum LegendCorner {
    UpperRight,
    LowerRight,
}

impl LegendCorner {
    fn position(self) -> SeriesLabelPosition {
        match self {
            LegendCorner::UpperRight => SeriesLabelPosition::UpperRight,
            LegendCorner::LowerRight => SeriesLabelPosition::LowerRight,
        }
    }
}

/// 1本の折れ線
struct Curve<'a> {
    label: &'a str,
    values: &'a [f64],
    color: RGBColor,
}

/// 1枚のパネルの描画内容
struct Panel<'a> {
    title: &'a str,
    x_desc: Option<&'a str>,
    curves: Vec<Curve<'a>>,
    legend: LegendCorner,
    /// 縦線を引くエポック
    marker: Option<usize>,
}

/// 系列の値域（上下に5%の余白）
pub(crate) fn value_range(series: &[&[f64]]) -> (f64, f64) {
    let (min, max) = series
        .iter()
        .flat_map(|s| s.iter().copied())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

/// x軸の上限（最終エポック。縦線がそれより右ならその位置まで広げる）
pub(crate) fn x_axis_max(epochs: usize, marker: Option<usize>) -> f64 {
    let last = epochs.saturating_sub(1).max(marker.unwrap_or(0));
    (last as f64).max(1.0)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
    }
    Ok(())
}

fn ensure_drawable(history: &TrainingHistory) -> Result<()> {
    history.validate()?;
    if history.epochs() == 0 {
        anyhow::bail!("history has no epochs to plot");
    }
    Ok(())
}

fn draw_panel(area: &DrawingArea<BitMapBackend<'_>, Shift>, panel: &Panel<'_>) -> Result<()> {
    let epochs = panel.curves.iter().map(|c| c.values.len()).max().unwrap_or(0);
    let x_max = x_axis_max(epochs, panel.marker);

    let all: Vec<&[f64]> = panel.curves.iter().map(|c| c.values).collect();
    let (y_min, y_max) = value_range(&all);

    let mut chart = ChartBuilder::on(area)
        .caption(panel.title, ("sans-serif", 22).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    let mut mesh = chart.configure_mesh();
    if let Some(x_desc) = panel.x_desc {
        mesh.x_desc(x_desc);
    }
    mesh.draw()?;

    for curve in &panel.curves {
        let color = curve.color;
        chart
            .draw_series(LineSeries::new(
                curve.values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                color.stroke_width(2),
            ))?
            .label(curve.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if let Some(epoch) = panel.marker {
        let x = epoch as f64;
        chart
            .draw_series(LineSeries::new(
                vec![(x, y_min), (x, y_max)],
                MARKER_COLOR.stroke_width(2),
            ))?
            .label("Start Fine Tuning")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MARKER_COLOR.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(panel.legend.position())
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

fn draw_single(path: &Path, panel: &Panel<'_>) -> Result<()> {
    ensure_parent(path)?;
    let root = BitMapBackend::new(path, CURVE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    draw_panel(&root, panel)?;
    root.present()
        .with_context(|| format!("Failed to write plot: {:?}", path))?;
    Ok(())
}

/// 損失と精度の学習曲線を別々の画像に描画
///
/// `output_dir`に`loss_curves.png`と`accuracy_curves.png`を出力します。
pub fn plot_loss_accuracy<P: AsRef<Path>>(history: &TrainingHistory, output_dir: P) -> Result<LossAccuracyPlots> {
    ensure_drawable(history)?;
    let output_dir = output_dir.as_ref();

    let plots = LossAccuracyPlots {
        loss_path: output_dir.join("loss_curves.png"),
        accuracy_path: output_dir.join("accuracy_curves.png"),
    };

    draw_single(
        &plots.loss_path,
        &Panel {
            title: "Loss Curves",
            x_desc: Some("Epochs"),
            curves: vec![
                Curve { label: "train_loss", values: &history.loss, color: TRAIN_COLOR },
                Curve { label: "val_loss", values: &history.val_loss, color: VAL_COLOR },
            ],
            legend: LegendCorner::UpperRight,
            marker: None,
        },
    )?;

    draw_single(
        &plots.accuracy_path,
        &Panel {
            title: "Accuracy Curves",
            x_desc: Some("Epochs"),
            curves: vec![
                Curve { label: "train_accuracy", values: &history.accuracy, color: TRAIN_COLOR },
                Curve { label: "val_accuracy", values: &history.val_accuracy, color: VAL_COLOR },
            ],
            legend: LegendCorner::LowerRight,
            marker: None,
        },
    )?;

    log::info!(
        "Saved loss/accuracy curves for {} epochs to {}",
        history.epochs(),
        output_dir.display()
    );
    Ok(plots)
}

/// 元の学習とファインチューニングの履歴を連結して比較グラフを描画
///
/// # 引数
/// - `original_history`: 最初の学習の履歴
/// - `new_history`: 続きから学習した履歴
/// - `initial_epochs`: 最初の学習のエポック数（この直前に縦線を引く）
///
/// # 戻り値
/// - 連結した履歴
pub fn compare_historys<P: AsRef<Path>>(
    original_history: &TrainingHistory,
    new_history: &TrainingHistory,
    initial_epochs: usize,
    output_path: P,
) -> Result<TrainingHistory> {
    if initial_epochs == 0 {
        return Err(HelperError::InvalidInitialEpochs(initial_epochs).into());
    }
    let total = original_history.concat(new_history);
    ensure_drawable(&total)?;

    let path = output_path.as_ref();
    ensure_parent(path)?;

    let root = BitMapBackend::new(path, COMPARE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));
    let marker = Some(initial_epochs - 1);

    draw_panel(
        &panels[0],
        &Panel {
            title: "Training and Validation Accuracy",
            x_desc: None,
            curves: vec![
                Curve { label: "Training Accuracy", values: &total.accuracy, color: TRAIN_COLOR },
                Curve { label: "Validation Accuracy", values: &total.val_accuracy, color: VAL_COLOR },
            ],
            legend: LegendCorner::LowerRight,
            marker,
        },
    )?;

    draw_panel(
        &panels[1],
        &Panel {
            title: "Training and Validation Loss",
            x_desc: Some("epoch"),
            curves: vec![
                Curve { label: "Training Loss", values: &total.loss, color: TRAIN_COLOR },
                Curve { label: "Validation Loss", values: &total.val_loss, color: VAL_COLOR },
            ],
            legend: LegendCorner::UpperRight,
            marker,
        },
    )?;

    root.present()
        .with_context(|| format!("Failed to write plot: {:?}", path))?;
    log::info!("Saved history comparison to {}", path.display());

    Ok(total)
}
