//! Video stream description and the codec seam used by the video pipeline.
//!
//! The pipeline never touches a container format directly; it asks a
//! [`VideoCodec`] to open a [`FrameSource`] on the staged upload and a
//! [`FrameSink`] on the output path.

use crate::capture::FrameSource;
use crate::output::FrameSink;
use anyhow::{ensure, Result};
use std::path::Path;

/// Geometry and timing of a video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second
    pub fps: f64,
}

impl StreamInfo {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self { width, height, fps }
    }

    /// Reject streams with zero dimensions or a non-positive frame rate.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "video reports invalid dimensions {}x{}",
            self.width,
            self.height
        );
        ensure!(
            self.fps.is_finite() && self.fps > 0.0,
            "video reports invalid frame rate {}",
            self.fps
        );
        Ok(())
    }
}

/// Opens frame sources and sinks on files.
pub trait VideoCodec: Send + Sync {
    /// Open `path` for sequential, front-to-back reading
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    /// Create `path` for sequential writing with the given geometry and rate
    fn open_sink(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>>;

    /// File extension used for staged input and output files
    fn container_extension(&self) -> &str {
        "mp4"
    }

    /// Fails when this codec cannot process video at all in this build.
    fn ensure_available(&self) -> Result<()> {
        Ok(())
    }
}

/// The codec compiled into this build.
pub fn default_codec() -> Box<dyn VideoCodec> {
    #[cfg(feature = "ffmpeg")]
    {
        Box::new(FfmpegCodec)
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Box::new(UnavailableCodec)
    }
}

/// MP4 via the system FFmpeg libraries; MPEG-4 Part 2 video on output.
#[cfg(feature = "ffmpeg")]
pub struct FfmpegCodec;

#[cfg(feature = "ffmpeg")]
impl VideoCodec for FfmpegCodec {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(crate::capture::FfmpegReader::open(path)?))
    }

    fn open_sink(&self, path: &Path, info: StreamInfo) -> Result<Box<dyn FrameSink>> {
        Ok(Box::new(crate::output::FfmpegWriter::create(path, info)?))
    }
}

#[cfg(not(feature = "ffmpeg"))]
const UNAVAILABLE: &str = "video support is not compiled in (rebuild with the `ffmpeg` feature)";

/// Stand-in for builds without the `ffmpeg` feature; every open fails.
#[cfg(not(feature = "ffmpeg"))]
pub struct UnavailableCodec;

#[cfg(not(feature = "ffmpeg"))]
impl VideoCodec for UnavailableCodec {
    fn open_source(&self, _path: &Path) -> Result<Box<dyn FrameSource>> {
        anyhow::bail!(UNAVAILABLE)
    }

    fn open_sink(&self, _path: &Path, _info: StreamInfo) -> Result<Box<dyn FrameSink>> {
        anyhow::bail!(UNAVAILABLE)
    }

    fn ensure_available(&self) -> Result<()> {
        anyhow::bail!(UNAVAILABLE)
    }
}
