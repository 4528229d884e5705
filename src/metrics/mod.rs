pub mod confusion;
pub mod evaluation;

pub use confusion::{
    blues, create_confusion_matrix, render_confusion_matrix, ConfusionMatrix, ConfusionMatrixOptions,
    ConfusionMatrixReport, CONFUSION_MATRIX_FILE,
};
pub use evaluation::{
    compare_baseline_to_new_model, evaluate_prediction, per_class_metrics, ClassMetrics, MetricComparison,
    ModelEvaluation,
};
