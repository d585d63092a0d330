//! Request orchestration: decode → inference → annotate → encode.
//!
//! Both endpoints run through [`Pipeline`]; the video path repeats the image
//! steps per frame, strictly sequentially.

use crate::annotate::Annotator;
use crate::capture::{decode_image, decode_video_payload, FrameSource, VideoStaging};
use crate::detection::{Detection, DetectionModel};
use crate::error::PipelineError;
use crate::output::{encode_png_base64, FrameSink};
use crate::segmentation::{SegmentationMask, SegmentationModel};
use crate::video::VideoCodec;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How often the video loop logs its rolling per-stage averages.
const STATS_INTERVAL: u64 = 30;

/// The two loaded models. Constructed once at startup and shared by all
/// requests; the locks only serialise individual inference calls.
pub struct Models {
    lane: Mutex<Box<dyn SegmentationModel>>,
    vehicle: Mutex<Box<dyn DetectionModel>>,
}

impl Models {
    pub fn new(lane: Box<dyn SegmentationModel>, vehicle: Box<dyn DetectionModel>) -> Self {
        Self {
            lane: Mutex::new(lane),
            vehicle: Mutex::new(vehicle),
        }
    }

    /// Run lane segmentation then vehicle detection on one frame.
    pub fn infer(
        &self,
        frame: &RgbImage,
    ) -> Result<(Vec<SegmentationMask>, Vec<Detection>), PipelineError> {
        let masks = self
            .lane
            .lock()
            .map_err(|_| poisoned("lane"))?
            .segment(frame)
            .map_err(PipelineError::ModelInference)?;
        let detections = self
            .vehicle
            .lock()
            .map_err(|_| poisoned("vehicle"))?
            .detect(frame)
            .map_err(PipelineError::ModelInference)?;
        Ok((masks, detections))
    }
}

fn poisoned(which: &str) -> PipelineError {
    PipelineError::ModelInference(anyhow::anyhow!("{which} model lock poisoned"))
}

/// Result of a processed video.
#[derive(Debug)]
pub struct VideoOutcome {
    pub frames_processed: u64,
    /// Base64 of the re-encoded container
    pub processed_video: String,
}

/// Everything a request needs, injected once at startup.
pub struct Pipeline {
    models: Models,
    annotator: Annotator,
    codec: Box<dyn VideoCodec>,
    staging_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        models: Models,
        annotator: Annotator,
        codec: Box<dyn VideoCodec>,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            models,
            annotator,
            codec,
            staging_dir,
        }
    }

    /// Annotate one uploaded image and return it as base64 PNG.
    pub fn process_image(&self, bytes: &[u8]) -> Result<String, PipelineError> {
        let _span = tracing::info_span!("process_image", bytes = bytes.len()).entered();

        let frame = decode_image(bytes)?;
        let (masks, detections) = self.models.infer(&frame)?;
        tracing::debug!(
            "{} lane masks, {} vehicles",
            masks.len(),
            detections.len()
        );
        let annotated = self.annotator.annotate(frame, &masks, &detections);
        encode_png_base64(&annotated).map_err(PipelineError::encode)
    }

    /// Annotate every frame of a base64 video and return the re-encoded
    /// container as base64.
    ///
    /// Staged files are removed on every exit path. A failure on any frame
    /// aborts the whole request; partial output is discarded.
    pub fn process_video(&self, payload: &str) -> Result<VideoOutcome, PipelineError> {
        let _span = tracing::info_span!("process_video").entered();

        self.codec
            .ensure_available()
            .map_err(|e| PipelineError::Unsupported(format!("{e:#}")))?;

        let bytes = decode_video_payload(payload)?;
        let staging = VideoStaging::create(
            &self.staging_dir,
            &bytes,
            self.codec.container_extension(),
        )
        .map_err(|e| PipelineError::Internal(format!("failed to stage video: {e}")))?;
        drop(bytes);

        let mut source = self
            .codec
            .open_source(staging.input_path())
            .map_err(PipelineError::decode)?;
        let info = source.info();
        info.validate().map_err(PipelineError::decode)?;

        let mut sink = self
            .codec
            .open_sink(staging.output_path(), info)
            .map_err(PipelineError::encode)?;

        let frames_processed = self.run_frames(source.as_mut(), sink.as_mut())?;
        if frames_processed == 0 {
            return Err(PipelineError::Decode("no frames could be decoded".into()));
        }
        sink.finish().map_err(PipelineError::encode)?;

        let encoded = staging.read_output().map_err(PipelineError::encode)?;
        tracing::info!(
            "Processed {} frames into {} bytes",
            frames_processed,
            encoded.len()
        );

        Ok(VideoOutcome {
            frames_processed,
            processed_video: STANDARD.encode(encoded),
        })
    }

    fn run_frames(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<u64, PipelineError> {
        let mut frame_count = 0u64;
        let mut total_decode_time = Duration::ZERO;
        let mut total_infer_time = Duration::ZERO;
        let mut total_annotate_time = Duration::ZERO;
        let mut total_encode_time = Duration::ZERO;

        let (width, height) = sink.resolution();
        tracing::info!("Starting video loop at {}x{}", width, height);

        loop {
            // Decode
            let decode_start = Instant::now();
            let Some(frame) = source.next_frame().map_err(|e| {
                PipelineError::Decode(format!("frame {}: {e:#}", frame_count + 1))
            })?
            else {
                break;
            };
            total_decode_time += decode_start.elapsed();

            // Inference
            let infer_start = Instant::now();
            let (masks, detections) = self.models.infer(&frame)?;
            total_infer_time += infer_start.elapsed();

            // Annotate
            let annotate_start = Instant::now();
            let annotated = self.annotator.annotate(frame, &masks, &detections);
            total_annotate_time += annotate_start.elapsed();

            // Encode
            let encode_start = Instant::now();
            sink.write_frame(&annotated).map_err(|e| {
                PipelineError::Encode(format!("frame {}: {e:#}", frame_count + 1))
            })?;
            total_encode_time += encode_start.elapsed();

            frame_count += 1;

            // Log stats every STATS_INTERVAL frames
            if frame_count % STATS_INTERVAL == 0 {
                log_stats(
                    frame_count,
                    total_decode_time,
                    total_infer_time,
                    total_annotate_time,
                    total_encode_time,
                );
            }
        }

        if frame_count > 0 {
            log_stats(
                frame_count,
                total_decode_time,
                total_infer_time,
                total_annotate_time,
                total_encode_time,
            );
        }
        Ok(frame_count)
    }
}

fn log_stats(frames: u64, decode: Duration, infer: Duration, annotate: Duration, encode: Duration) {
    let avg_ms = |d: Duration| d.as_secs_f64() * 1000.0 / frames as f64;
    let (decode_ms, infer_ms, annotate_ms, encode_ms) =
        (avg_ms(decode), avg_ms(infer), avg_ms(annotate), avg_ms(encode));
    let total_ms = decode_ms + infer_ms + annotate_ms + encode_ms;

    tracing::info!(
        "Frame {}: decode={:.1}ms, infer={:.1}ms, annotate={:.1}ms, encode={:.1}ms, total={:.1}ms, fps={:.1}",
        frames,
        decode_ms,
        infer_ms,
        annotate_ms,
        encode_ms,
        total_ms,
        1000.0 / total_ms.max(f64::EPSILON)
    );
}
