//! 画像分類の実験用ヘルパー関数群
//!
//! 各関数は独立しており、共有状態を持ちません。
//! - `dataset`: アーカイブ展開、ディレクトリ走査、クラス別画像一覧
//! - `ml`: 画像の前処理と単一画像の推論・可視化
//! - `history`: 学習曲線の描画
//! - `metrics`: 混同行列と評価指標
//! - `experiment`: タイムスタンプ付きの実験ログ

pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod history;
pub mod metrics;
pub mod ml;

pub use config::HelperConfig;
pub use dataset::{extract_archive, unzip_data, unzip_data_to, walk_through_dir, DirSummary, ImageFolder};
pub use error::HelperError;
pub use experiment::{create_tensorboard_callback, ExperimentLogger};
pub use history::{compare_historys, plot_loss_accuracy, EpochRecord, TrainingHistory};
pub use metrics::{
    compare_baseline_to_new_model, create_confusion_matrix, evaluate_prediction, ConfusionMatrix,
    ConfusionMatrixOptions, ModelEvaluation,
};
pub use ml::{load_prep_image, pred_view, predict_class, ImageTensor, Prediction, Predictor};
