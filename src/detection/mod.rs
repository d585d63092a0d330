mod types;
mod yolo;

pub use types::{BBox, Detection, DetectionModel};
pub use yolo::YoloDetector;

use crate::inference::InferenceOptions;
use anyhow::Result;
use std::path::Path;

/// Create the default detection model (YOLOv8 over ONNX Runtime)
pub fn create_default_model(
    model_path: &Path,
    options: InferenceOptions,
) -> Result<Box<dyn DetectionModel>> {
    let model = YoloDetector::new(model_path, options)?;
    Ok(Box::new(model))
}
