//! 分類モデルの評価指標

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::metrics::confusion::ConfusionMatrix;

/// 評価指標
///
/// `accuracy`はパーセント、それ以外はサポート数で重み付けした平均（0〜1）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ModelEvaluation {
    /// 指標名と値の組（accuracy, precision, recall, f1 の順）
    pub fn metrics(&self) -> [(&'static str, f64); 4] {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1", self.f1),
        ]
    }
}

impl std::fmt::Display for ModelEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "accuracy: {:.2}, precision: {:.4}, recall: {:.4}, f1: {:.4}",
            self.accuracy, self.precision, self.recall, self.f1
        )
    }
}

/// ラベルごとの指標
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// 正解ラベルとしての出現数
    pub support: u64,
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// 混同行列からラベルごとの適合率・再現率・F1を計算
///
/// 分母が0の指標は0とします。
pub fn per_class_metrics<T>(matrix: &ConfusionMatrix<T>) -> Vec<ClassMetrics> {
    let n = matrix.n_classes();
    let row_sums = matrix.row_sums();
    let col_sums = matrix.col_sums();

    (0..n)
        .map(|k| {
            let tp = matrix.get(k, k);
            let precision = ratio(tp, col_sums[k]);
            let recall = ratio(tp, row_sums[k]);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                precision,
                recall,
                f1,
                support: row_sums[k],
            }
        })
        .collect()
}

/// 正解率・適合率・再現率・F1を計算
///
/// # 引数
/// - `y_true`: 正解ラベル
/// - `y_pred`: 予測ラベル（`y_true`と同じ長さ）
pub fn evaluate_prediction<T: Ord + Clone>(y_true: &[T], y_pred: &[T]) -> Result<ModelEvaluation> {
    let matrix = ConfusionMatrix::from_labels(y_true, y_pred)?;
    let total = matrix.total();

    let correct: u64 = (0..matrix.n_classes()).map(|k| matrix.get(k, k)).sum();
    let per_class = per_class_metrics(&matrix);

    let weighted = |metric: fn(&ClassMetrics) -> f64| -> f64 {
        per_class
            .iter()
            .map(|m| metric(m) * m.support as f64)
            .sum::<f64>()
            / total as f64
    };

    let evaluation = ModelEvaluation {
        accuracy: ratio(correct, total) * 100.0,
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1: weighted(|m| m.f1),
    };

    log::debug!("Evaluated {} predictions: {}", total, evaluation);
    Ok(evaluation)
}

/// 指標1つ分の比較結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub name: &'static str,
    pub baseline: f64,
    pub new: f64,
    /// new - baseline
    pub difference: f64,
}

impl std::fmt::Display for MetricComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Baseline {name}: {:.2}, New_model {name}: {:.2}, Difference: {:.2}",
            self.baseline,
            self.new,
            self.difference,
            name = self.name
        )
    }
}

/// ベースラインと新モデルの指標を比較して表示
pub fn compare_baseline_to_new_model(
    baseline_evaluation: &ModelEvaluation,
    new_model_evaluation: &ModelEvaluation,
) -> Vec<MetricComparison> {
    baseline_evaluation
        .metrics()
        .iter()
        .zip(new_model_evaluation.metrics().iter())
        .map(|(&(name, baseline), &(_, new))| {
            let comparison = MetricComparison {
                name,
                baseline,
                new,
                difference: new - baseline,
            };
            println!("{}", comparison);
            comparison
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HelperError;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn test_perfect_predictions() {
        let labels = [0, 1, 2, 2, 1, 0];
        let eval = evaluate_prediction(&labels, &labels).unwrap();
        assert_eq!(
            eval,
            ModelEvaluation {
                accuracy: 100.0,
                precision: 1.0,
                recall: 1.0,
                f1: 1.0
            }
        );
    }

    #[test]
    fn test_weighted_average() {
        let y_true = [0, 1, 2, 0, 1, 2];
        let y_pred = [0, 2, 1, 0, 0, 1];
        let eval = evaluate_prediction(&y_true, &y_pred).unwrap();

        assert_close(eval.accuracy, 100.0 / 3.0);
        assert_close(eval.precision, 2.0 / 9.0);
        assert_close(eval.recall, 1.0 / 3.0);
        assert_close(eval.f1, 0.8 / 3.0);
    }

    #[test]
    fn test_label_only_predicted_has_zero_weight() {
        // cowは予測にのみ現れるので重み0
        let y_true = ["cat", "cat", "dog", "dog"];
        let y_pred = ["cat", "cow", "dog", "dog"];
        let eval = evaluate_prediction(&y_true, &y_pred).unwrap();

        assert_close(eval.accuracy, 75.0);
        assert_close(eval.precision, 1.0);
        assert_close(eval.recall, 0.75);
        // cat: p=1, r=0.5, f1=2/3; dog: f1=1
        assert_close(eval.f1, (2.0 / 3.0 * 2.0 + 2.0) / 4.0);
    }

    #[test]
    fn test_mismatched_lengths() {
        let err = evaluate_prediction(&[0, 1], &[0]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<HelperError>(),
            Some(&HelperError::LengthMismatch { y_true: 2, y_pred: 1 })
        );
    }

    #[test]
    fn test_compare_baseline_to_new_model() {
        let baseline = ModelEvaluation {
            accuracy: 80.0,
            precision: 0.8,
            recall: 0.75,
            f1: 0.77,
        };
        let new = ModelEvaluation {
            accuracy: 85.5,
            precision: 0.86,
            recall: 0.8,
            f1: 0.83,
        };

        let rows = compare_baseline_to_new_model(&baseline, &new);
        let names: Vec<&str> = rows.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["accuracy", "precision", "recall", "f1"]);
        assert_close(rows[0].difference, 5.5);
        assert_eq!(
            rows[0].to_string(),
            "Baseline accuracy: 80.00, New_model accuracy: 85.50, Difference: 5.50"
        );
    }
}
