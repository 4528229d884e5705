//! 実験ログ（タイムスタンプ付きディレクトリ）の管理
//!
//! ログディレクトリ構成:
//! - `dir_name/experiment_name/YYYYmmdd-HHMMSS/metrics.csv` - エポックごとの指標
//! - `dir_name/experiment_name/YYYYmmdd-HHMMSS/evaluation.json` - 評価結果

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::history::{EpochRecord, TrainingHistory};
use crate::metrics::ModelEvaluation;

/// タイムスタンプの書式
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const METRICS_FILE: &str = "metrics.csv";
const EVALUATION_FILE: &str = "evaluation.json";

/// 実験ごとのログ書き込み先
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentLogger {
    log_dir: PathBuf,
}

/// 現在時刻のログディレクトリを作成
///
/// ログは `dir_name/experiment_name/現在日時/` に保存されます。
pub fn create_tensorboard_callback<P: AsRef<Path>>(dir_name: P, experiment_name: &str) -> Result<ExperimentLogger> {
    ExperimentLogger::with_timestamp(dir_name, experiment_name, Local::now())
}

impl ExperimentLogger {
    /// 指定時刻のログディレクトリを作成
    pub fn with_timestamp<P: AsRef<Path>>(
        dir_name: P,
        experiment_name: &str,
        timestamp: DateTime<Local>,
    ) -> Result<Self> {
        let log_dir = dir_name
            .as_ref()
            .join(experiment_name)
            .join(timestamp.format(TIMESTAMP_FORMAT).to_string());

        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;
        println!("Saving Tensorboard log files to {}", log_dir.display());

        Ok(Self { log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.log_dir.join(METRICS_FILE)
    }

    /// 1エポック分の指標を追記
    pub fn record_epoch(&self, record: &EpochRecord) -> Result<()> {
        let path = self.metrics_path();
        let write_header = !path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open metrics file: {:?}", path))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        log::debug!(
            "epoch {}: loss={:.4} accuracy={:.4} val_loss={:.4} val_accuracy={:.4}",
            record.epoch,
            record.loss,
            record.accuracy,
            record.val_loss,
            record.val_accuracy
        );
        Ok(())
    }

    /// 記録済みの指標を学習履歴として読み込む
    pub fn history(&self) -> Result<TrainingHistory> {
        let path = self.metrics_path();
        if !path.exists() {
            return Ok(TrainingHistory::default());
        }
        TrainingHistory::from_csv_file(&path)
    }

    /// 評価結果をJSONで保存
    pub fn write_evaluation(&self, evaluation: &ModelEvaluation) -> Result<PathBuf> {
        let path = self.log_dir.join(EVALUATION_FILE);
        let json = serde_json::to_string_pretty(evaluation)
            .context("Failed to serialize evaluation to JSON")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write evaluation: {:?}", path))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_log_dir_layout() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ExperimentLogger::with_timestamp(dir.path(), "efficientnet", fixed_time()).unwrap();

        assert_eq!(
            logger.log_dir(),
            dir.path().join("efficientnet").join("20240309-140507")
        );
        assert!(logger.log_dir().is_dir());
    }

    #[test]
    fn test_create_tensorboard_callback_uses_now() {
        let dir = tempfile::tempdir().unwrap();
        let logger = create_tensorboard_callback(dir.path(), "resnet").unwrap();

        let stamp = logger.log_dir().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(stamp.len(), "YYYYmmdd-HHMMSS".len());
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());
        assert!(logger.log_dir().starts_with(dir.path().join("resnet")));
    }

    #[test]
    fn test_record_epochs_round_trip_to_history() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ExperimentLogger::with_timestamp(dir.path(), "exp", fixed_time()).unwrap();
        assert_eq!(logger.history().unwrap(), TrainingHistory::default());

        for epoch in 0..3 {
            let e = epoch as f64;
            logger
                .record_epoch(&EpochRecord {
                    epoch,
                    loss: 1.0 - e * 0.2,
                    accuracy: 0.5 + e * 0.1,
                    val_loss: 1.1 - e * 0.2,
                    val_accuracy: 0.45 + e * 0.1,
                })
                .unwrap();
        }

        let history = logger.history().unwrap();
        assert_eq!(history.epochs(), 3);
        assert!((history.loss[2] - 0.6).abs() < 1e-12);
        assert!(history.validate().is_ok());

        let header = std::fs::read_to_string(logger.metrics_path()).unwrap();
        assert_eq!(header.matches("epoch,").count(), 1);
    }

    #[test]
    fn test_write_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ExperimentLogger::with_timestamp(dir.path(), "exp", fixed_time()).unwrap();
        let evaluation = ModelEvaluation {
            accuracy: 91.0,
            precision: 0.9,
            recall: 0.91,
            f1: 0.905,
        };

        let path = logger.write_evaluation(&evaluation).unwrap();
        let loaded: ModelEvaluation = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, evaluation);
    }
}
