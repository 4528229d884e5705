pub mod image_prep;
pub mod predict;

pub use image_prep::{image_to_tensor, load_prep_image, load_prep_image_default, ImageTensor, DEFAULT_IMAGE_SIZE, NUM_CHANNELS};
pub use predict::{class_from_output, pred_view, predict_class, render_prediction, Prediction, Predictor};
#[cfg(feature = "ml")]
pub use predict::{BurnPredictor, ImageModel};
