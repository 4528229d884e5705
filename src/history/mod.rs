pub mod training_history;
pub mod plots;

pub use training_history::{EpochRecord, TrainingHistory};
pub use plots::{compare_historys, plot_loss_accuracy, LossAccuracyPlots, DEFAULT_INITIAL_EPOCHS};
