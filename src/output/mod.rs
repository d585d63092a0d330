#[cfg(feature = "ffmpeg")]
mod ffmpeg;
mod png;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegWriter;
pub use png::{encode_png, encode_png_base64};

use anyhow::Result;
use image::RgbImage;

/// Trait for output destinations
pub trait FrameSink {
    /// Write a frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);

    /// Flush pending data and close the output. A sink dropped without
    /// `finish` leaves an incomplete file behind.
    fn finish(self: Box<Self>) -> Result<()>;
}
