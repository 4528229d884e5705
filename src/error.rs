//! ヘルパー関数共通のエラー定義
//!
//! 入出力エラーは`anyhow::Context`で文脈を付けて伝播し、
//! 入力値そのものの不整合はこの列挙型で表します。
//! 呼び出し側は`anyhow::Error::downcast_ref::<HelperError>()`で判別できます。

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HelperError {
    /// 正解ラベルと予測ラベルの長さが異なる
    #[error("y_true has {y_true} labels but y_pred has {y_pred}")]
    LengthMismatch { y_true: usize, y_pred: usize },

    /// ラベル配列が空
    #[error("label arrays are empty")]
    EmptyLabels,

    /// 指定されたクラス名の数が行列のクラス数と一致しない
    #[error("{given} class names given for a {expected}-class confusion matrix")]
    ClassCountMismatch { given: usize, expected: usize },

    /// 予測インデックスがクラス名の範囲外
    #[error("predicted class index {index} is out of range for {num_classes} class names")]
    ClassIndexOutOfRange { index: usize, num_classes: usize },

    /// モデル出力が空
    #[error("model returned an empty prediction")]
    EmptyPrediction,

    /// 画像サイズが不正
    #[error("image size must be positive, got {0}")]
    InvalidImageSize(u32),

    /// 対応していないアーカイブ形式
    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(PathBuf),

    /// 学習履歴の系列長が揃っていない
    #[error("history series `{series}` has {actual} epochs, expected {expected}")]
    InconsistentHistory {
        series: &'static str,
        expected: usize,
        actual: usize,
    },

    /// ファインチューニング開始エポックが不正
    #[error("initial_epochs must be at least 1, got {0}")]
    InvalidInitialEpochs(usize),
}

/// 正解ラベルと予測ラベルの長さを検証
pub(crate) fn check_label_lengths<T>(y_true: &[T], y_pred: &[T]) -> Result<(), HelperError> {
    if y_true.len() != y_pred.len() {
        return Err(HelperError::LengthMismatch {
            y_true: y_true.len(),
            y_pred: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(HelperError::EmptyLabels);
    }
    Ok(())
}
