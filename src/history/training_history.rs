//! 学習履歴（エポックごとの損失・精度）

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::HelperError;

/// エポックごとの学習履歴
///
/// Kerasの`history.history`と同じ形のJSONオブジェクトから読み込めます。
/// 未知のキー（学習率など）は無視します。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    #[serde(default)]
    pub loss: Vec<f64>,
    #[serde(default)]
    pub val_loss: Vec<f64>,
    #[serde(default)]
    pub accuracy: Vec<f64>,
    #[serde(default)]
    pub val_accuracy: Vec<f64>,
}

/// 1エポック分の記録（CSVの1行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

impl TrainingHistory {
    /// JSONファイルから読み込む
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Failed to parse history file: {}", path.display()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize history from JSON")
    }

    /// エポックCSV（epoch, loss, accuracy, val_loss, val_accuracy列）から読み込む
    ///
    /// 列の順序は問いません。
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open history CSV: {}", path.display()))?;

        let mut records = Vec::new();
        for (i, row) in reader.deserialize::<EpochRecord>().enumerate() {
            let record = row.with_context(|| format!("Invalid row {} in {}", i + 1, path.display()))?;
            records.push(record);
        }
        records.sort_by_key(|r| r.epoch);
        Ok(Self::from_records(&records))
    }

    /// 拡張子に応じて読み込む（.csv ならCSV、それ以外はJSON）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_csv = path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            Self::from_csv_file(path)
        } else {
            Self::from_json_file(path)
        }
    }

    pub fn from_records(records: &[EpochRecord]) -> Self {
        Self {
            loss: records.iter().map(|r| r.loss).collect(),
            val_loss: records.iter().map(|r| r.val_loss).collect(),
            accuracy: records.iter().map(|r| r.accuracy).collect(),
            val_accuracy: records.iter().map(|r| r.val_accuracy).collect(),
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize history to JSON")
    }

    /// エポック数（lossの長さ）
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    /// 4系列の長さが揃っているか検証
    pub fn validate(&self) -> Result<(), HelperError> {
        let expected = self.loss.len();
        for (series, values) in [
            ("val_loss", &self.val_loss),
            ("accuracy", &self.accuracy),
            ("val_accuracy", &self.val_accuracy),
        ] {
            if values.len() != expected {
                return Err(HelperError::InconsistentHistory {
                    series,
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// `other`を後ろに連結した履歴
    pub fn concat(&self, other: &TrainingHistory) -> TrainingHistory {
        fn join(a: &[f64], b: &[f64]) -> Vec<f64> {
            a.iter().chain(b).copied().collect()
        }
        TrainingHistory {
            loss: join(&self.loss, &other.loss),
            val_loss: join(&self.val_loss, &other.val_loss),
            accuracy: join(&self.accuracy, &other.accuracy),
            val_accuracy: join(&self.val_accuracy, &other.val_accuracy),
        }
    }
}
