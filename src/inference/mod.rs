//! Shared plumbing for the ONNX-backed models: session construction, input
//! preprocessing and decoding of YOLOv8-style output heads.

mod preprocess;
mod session;
pub(crate) mod yolo;

pub use preprocess::{resize_mask, Preprocessor};
pub use session::build_session;

/// Knobs shared by the detection and segmentation backends.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// Square model input size in pixels
    pub input_size: u32,
    /// Candidates scoring below this are discarded before NMS
    pub conf_threshold: f32,
    /// Overlap above which a lower-scoring box of the same class is suppressed
    pub iou_threshold: f32,
    /// Upper bound on detections returned per frame
    pub max_detections: usize,
    /// ONNX Runtime intra-op thread count
    pub intra_threads: usize,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            intra_threads: 4,
        }
    }
}
