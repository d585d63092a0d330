use crate::inference::InferenceOptions;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "ROADLENS_BIND", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// Lane segmentation model (YOLOv8-seg ONNX export)
    #[arg(long, env = "ROADLENS_LANE_MODEL", default_value = "best_lane.onnx")]
    pub lane_model: PathBuf,

    /// Vehicle detection model (YOLOv8 ONNX export)
    #[arg(long, env = "ROADLENS_VEHICLE_MODEL", default_value = "best_vehicle.onnx")]
    pub vehicle_model: PathBuf,

    /// Square model input size in pixels
    #[arg(long, env = "ROADLENS_INPUT_SIZE", default_value_t = 640)]
    pub input_size: u32,

    /// Minimum confidence for a detection or lane instance
    #[arg(long, env = "ROADLENS_CONF_THRESHOLD", default_value_t = 0.25)]
    pub conf_threshold: f32,

    /// IoU above which overlapping boxes of the same class are suppressed
    #[arg(long, env = "ROADLENS_IOU_THRESHOLD", default_value_t = 0.7)]
    pub iou_threshold: f32,

    /// Maximum detections kept per frame
    #[arg(long, env = "ROADLENS_MAX_DETECTIONS", default_value_t = 300)]
    pub max_detections: usize,

    /// ONNX Runtime intra-op threads per model
    #[arg(long, env = "ROADLENS_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Font for detection captions (TTF/OTF)
    /// If not provided, the bundled DejaVu Sans is used
    #[arg(long, env = "ROADLENS_FONT")]
    pub font: Option<PathBuf>,

    /// Request body limit in MiB (base64 videos are large)
    #[arg(long, env = "ROADLENS_MAX_BODY_MB", default_value_t = 512)]
    pub max_body_mb: usize,

    /// Directory for per-request video staging (defaults to the system temp dir)
    #[arg(long, env = "ROADLENS_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            input_size: self.input_size,
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
            intra_threads: self.intra_threads,
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
