mod decode;
#[cfg(feature = "ffmpeg")]
mod ffmpeg;
mod staging;

pub use decode::{decode_image, decode_video_payload};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegReader;
pub use staging::VideoStaging;

use crate::video::StreamInfo;
use anyhow::Result;
use image::RgbImage;

/// Trait for sequential frame sources
pub trait FrameSource {
    /// Read the next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the geometry and frame rate of the stream
    fn info(&self) -> StreamInfo;
}
