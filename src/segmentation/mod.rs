pub mod types;
mod yolo_seg;

pub use types::{SegmentationMask, SegmentationModel};
pub use yolo_seg::YoloSegmenter;

use crate::inference::InferenceOptions;
use anyhow::Result;
use std::path::Path;

/// Create the default segmentation model (YOLOv8-seg over ONNX Runtime)
pub fn create_default_model(
    model_path: &Path,
    options: InferenceOptions,
) -> Result<Box<dyn SegmentationModel>> {
    let model = YoloSegmenter::new(model_path, options)?;
    Ok(Box::new(model))
}
