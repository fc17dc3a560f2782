use crate::bounding_box::BoundingBox;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to build input tensor: {0}")]
    Tensor(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Unexpected model output: {0}")]
    OutputShape(String),
    #[error("Model session pool is empty")]
    SessionPool,
}

/// A loaded detector shared by every request.
///
/// `predict` is blocking and CPU bound; callers run it off the async runtime.
pub trait ModelService: Send + Sync + 'static {
    fn predict(&self, image: &RgbImage) -> Result<Vec<BoundingBox>, ModelError>;
}
