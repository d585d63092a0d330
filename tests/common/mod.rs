#![allow(dead_code)]

use anyhow::{bail, ensure, Context, Result};
use image::{GrayImage, RgbImage};
use roadlens::annotate::Annotator;
use roadlens::capture::FrameSource;
use roadlens::detection::{Detection, DetectionModel};
use roadlens::output::FrameSink;
use roadlens::pipeline::{Models, Pipeline};
use roadlens::segmentation::{SegmentationMask, SegmentationModel};
use roadlens::video::{StreamInfo, VideoCodec};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Segmenter that returns the same masks for every frame and counts calls.
pub struct FixedSegmenter {
    pub masks: Vec<SegmentationMask>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedSegmenter {
    pub fn new(masks: Vec<SegmentationMask>) -> Self {
        Self {
            masks,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SegmentationModel for FixedSegmenter {
    fn segment(&mut self, _frame: &RgbImage) -> Result<Vec<SegmentationMask>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.masks.clone())
    }

    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }
}

/// Detector that returns the same detections for every frame.
pub struct FixedDetector {
    pub detections: Vec<Detection>,
}

impl DetectionModel for FixedDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }

    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }
}

/// Detector whose every call fails.
pub struct BrokenDetector;

impl DetectionModel for BrokenDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        bail!("session run failed")
    }

    fn input_size(&self) -> (u32, u32) {
        (640, 640)
    }
}

const RAW_MAGIC: &[u8; 4] = b"RAWV";
const RAW_HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Uncompressed test container: magic, width, height (u32 LE), fps (f64 LE),
/// then packed RGB frames back to back.
pub fn encode_raw_video(frames: &[RgbImage], fps: f64) -> Vec<u8> {
    let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
    encode_raw_video_with_size(frames, width, height, fps)
}

pub fn encode_raw_video_with_size(
    frames: &[RgbImage],
    width: u32,
    height: u32,
    fps: f64,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(RAW_MAGIC);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&fps.to_le_bytes());
    for frame in frames {
        out.extend_from_slice(frame.as_raw());
    }
    out
}

pub fn decode_raw_video(bytes: &[u8]) -> Result<(StreamInfo, Vec<RgbImage>)> {
    ensure!(bytes.len() >= RAW_HEADER_LEN, "truncated header");
    ensure!(&bytes[..4] == RAW_MAGIC, "bad magic");
    let width = u32::from_le_bytes(bytes[4..8].try_into()?);
    let height = u32::from_le_bytes(bytes[8..12].try_into()?);
    let fps = f64::from_le_bytes(bytes[12..20].try_into()?);
    let info = StreamInfo::new(width, height, fps);

    let frame_len = (width * height * 3) as usize;
    let body = &bytes[RAW_HEADER_LEN..];
    if frame_len == 0 {
        return Ok((info, Vec::new()));
    }
    ensure!(body.len() % frame_len == 0, "partial frame");
    let frames = body
        .chunks(frame_len)
        .map(|chunk| RgbImage::from_raw(width, height, chunk.to_vec()).context("frame size"))
        .collect::<Result<Vec<_>>>()?;
    Ok((info, frames))
}

/// [`VideoCodec`] over the raw test container.
#[derive(Default)]
pub struct RawVideoCodec {
    /// Fail when the source is asked for frame `n + 1`
    pub fail_after: Option<usize>,
}

impl VideoCodec for RawVideoCodec {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let bytes = std::fs::read(path)?;
        let (info, frames) = decode_raw_video(&bytes)?;
        Ok(Box::new(RawSource {
            info,
            frames: frames.into_iter(),
            read: 0,
            fail_after: self.fail_after,
        }))
    }

    fn open_sink(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>> {
        Ok(Box::new(RawSink {
            path: path.to_path_buf(),
            info,
            frames: Vec::new(),
        }))
    }

    fn container_extension(&self) -> &str {
        "raw"
    }
}

struct RawSource {
    info: StreamInfo,
    frames: std::vec::IntoIter<RgbImage>,
    read: usize,
    fail_after: Option<usize>,
}

impl FrameSource for RawSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.fail_after == Some(self.read) {
            bail!("corrupt packet");
        }
        self.read += 1;
        Ok(self.frames.next())
    }

    fn info(&self) -> StreamInfo {
        self.info
    }
}

struct RawSink {
    path: PathBuf,
    info: StreamInfo,
    frames: Vec<RgbImage>,
}

impl FrameSink for RawSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        ensure!(
            frame.dimensions() == (self.info.width, self.info.height),
            "frame size changed mid-stream"
        );
        self.frames.push(frame.clone());
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let StreamInfo { width, height, fps } = self.info;
        let bytes = encode_raw_video_with_size(&self.frames, width, height, fps);
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

/// Codec standing in for a build without video support.
pub struct MissingCodec;

impl VideoCodec for MissingCodec {
    fn open_source(&self, _path: &Path) -> Result<Box<dyn FrameSource>> {
        bail!("no video backend")
    }

    fn open_sink(&self, _path: &Path, _info: StreamInfo) -> Result<Box<dyn FrameSink>> {
        bail!("no video backend")
    }

    fn ensure_available(&self) -> Result<()> {
        bail!("no video backend")
    }
}

/// Build a pipeline around test doubles, captioning with the bundled font.
pub fn pipeline(
    lane: Box<dyn SegmentationModel>,
    vehicle: Box<dyn DetectionModel>,
    codec: impl VideoCodec + 'static,
    staging_dir: &Path,
) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        Models::new(lane, vehicle),
        Annotator::bundled().unwrap(),
        Box::new(codec),
        staging_dir.to_path_buf(),
    ))
}

pub fn full_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, image::Luma([255]))
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
