//! ヘルパー関数のコマンドラインツール
//!
//! 使い方:
//!   vision_helpers unzip <archive> [dest]
//!   vision_helpers walk <dir>
//!   vision_helpers evaluate <predictions.csv> [--classes a,b,...] [--norm] [--out dir]
//!   vision_helpers history <history.json|csv> [out_dir]

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use vision_helpers_lib::config::HelperConfig;
use vision_helpers_lib::dataset::{extract_archive, walk_through_dir};
use vision_helpers_lib::history::{plot_loss_accuracy, TrainingHistory};
use vision_helpers_lib::metrics::{create_confusion_matrix, evaluate_prediction, ConfusionMatrixOptions};

const USAGE: &str = "usage:
  vision_helpers unzip <archive> [dest]
  vision_helpers walk <dir>
  vision_helpers evaluate <predictions.csv> [--classes a,b,...] [--norm] [--out dir]
  vision_helpers history <history.json|csv> [out_dir]";

/// 予測CSVの1行
#[derive(Debug, Deserialize)]
struct PredictionRow {
    y_true: String,
    y_pred: String,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("✗ エラー: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let config = HelperConfig::load_or_default();

    match args.first().map(String::as_str) {
        Some("unzip") => {
            let archive = args.get(1).context(USAGE)?;
            let dest = destination_or_cwd(args.get(2))?;
            let summary = extract_archive(archive, &dest)?;
            println!(
                "✓ {} entries extracted to {}",
                summary.entries,
                summary.destination.display()
            );
        }
        Some("walk") => {
            let dir = args.get(1).context(USAGE)?;
            walk_through_dir(dir)?;
        }
        Some("evaluate") => {
            let csv_path = args.get(1).context(USAGE)?;
            evaluate(csv_path, &args[2..], &config)?;
        }
        Some("history") => {
            let history_path = args.get(1).context(USAGE)?;
            let out_dir = args
                .get(2)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&config.plot.output_dir));
            let history = TrainingHistory::from_file(history_path)?;
            let plots = plot_loss_accuracy(&history, &out_dir)?;
            println!("✓ {}", plots.loss_path.display());
            println!("✓ {}", plots.accuracy_path.display());
        }
        _ => {
            println!("{}", USAGE);
        }
    }

    Ok(())
}

/// 展開先（省略時はカレントディレクトリ）
fn destination_or_cwd(dest: Option<&String>) -> Result<PathBuf> {
    match dest {
        Some(dest) => Ok(PathBuf::from(dest)),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

fn parse_all(labels: &[String]) -> Option<Vec<i64>> {
    labels.iter().map(|s| s.parse::<i64>().ok()).collect()
}

fn evaluate(csv_path: &str, flags: &[String], config: &HelperConfig) -> Result<()> {
    let mut options = ConfusionMatrixOptions {
        figsize: (config.plot.width, config.plot.height),
        text_size: config.plot.text_size,
        savefig: true,
        output_dir: PathBuf::from(&config.plot.output_dir),
        ..Default::default()
    };

    let mut iter = flags.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--norm" => options.norm = true,
            "--classes" => {
                let list = iter.next().context("--classes needs a comma-separated list")?;
                options.classes = Some(list.split(',').map(|s| s.trim().to_string()).collect());
            }
            "--out" => {
                let dir = iter.next().context("--out needs a directory")?;
                options.output_dir = PathBuf::from(dir);
            }
            other => anyhow::bail!("unknown option: {}\n{}", other, USAGE),
        }
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open predictions CSV: {}", csv_path))?;
    let rows: Vec<PredictionRow> = reader
        .deserialize::<PredictionRow>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse predictions CSV: {}", csv_path))?;

    let y_true: Vec<String> = rows.iter().map(|r| r.y_true.trim().to_string()).collect();
    let y_pred: Vec<String> = rows.iter().map(|r| r.y_pred.trim().to_string()).collect();

    // 整数ラベルなら数値順で並べる
    let (evaluation, figure_path) = match (parse_all(&y_true), parse_all(&y_pred)) {
        (Some(t), Some(p)) => (
            evaluate_prediction(&t, &p)?,
            create_confusion_matrix(&t, &p, &options)?.figure_path,
        ),
        _ => (
            evaluate_prediction(&y_true, &y_pred)?,
            create_confusion_matrix(&y_true, &y_pred, &options)?.figure_path,
        ),
    };

    for (name, value) in evaluation.metrics() {
        println!("{}: {:.4}", name, value);
    }
    if let Some(path) = figure_path {
        println!("✓ {}", path.display());
    }
    Ok(())
}
