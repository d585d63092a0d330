use super::FrameSink;
use crate::video::StreamInfo;
use anyhow::{ensure, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, encoder, format, frame, software::scaling, util::rational::Rational};
use image::RgbImage;
use std::path::Path;

/// Encoder pixel format (YUV420p is universally compatible).
const ENCODE_FORMAT: format::Pixel = format::Pixel::YUV420P;
/// MPEG-4 Part 2, the `mp4v` FourCC.
const ENCODE_CODEC: codec::Id = codec::Id::MPEG4;
/// Target bitrate per pixel per frame.
const BITS_PER_PIXEL: f64 = 0.15;
/// Frame rates are expressed over this denominator so NTSC rates stay exact.
const RATE_DENOMINATOR: i32 = 1001;

/// Sequential MP4 writer; frames must all match the configured size.
pub struct FfmpegWriter {
    output: format::context::Output,
    encoder: encoder::Video,
    to_yuv: scaling::Context,
    rgb: frame::Video,
    yuv: frame::Video,
    stream_index: usize,
    time_base: Rational,
    width: u32,
    height: u32,
    next_pts: i64,
}

impl FfmpegWriter {
    pub fn create<P: AsRef<Path>>(path: P, info: StreamInfo) -> Result<Self> {
        let path = path.as_ref();
        info.validate()?;
        ffmpeg::init().context("Failed to initialise FFmpeg")?;

        let mut output = format::output(path)
            .with_context(|| format!("Could not create output container {}", path.display()))?;
        let global_header = output
            .format()
            .flags()
            .contains(format::flag::Flags::GLOBAL_HEADER);

        let codec = encoder::find(ENCODE_CODEC).context("MPEG-4 encoder not found")?;

        let frame_rate = Rational::new(
            (info.fps * RATE_DENOMINATOR as f64).round() as i32,
            RATE_DENOMINATOR,
        );
        let time_base = frame_rate.invert();

        let mut stream = output.add_stream(codec)?;
        let mut builder = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("Failed to create video encoder")?;
        builder.set_width(info.width);
        builder.set_height(info.height);
        builder.set_format(ENCODE_FORMAT);
        builder.set_time_base(time_base);
        builder.set_frame_rate(Some(frame_rate));
        builder.set_bit_rate(
            (info.width as f64 * info.height as f64 * info.fps * BITS_PER_PIXEL) as usize,
        );
        if global_header {
            builder.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }

        let encoder = builder
            .open_as(codec)
            .context("Failed to open MPEG-4 encoder")?;
        stream.set_parameters(&encoder);
        stream.set_time_base(time_base);
        let stream_index = stream.index();

        output
            .write_header()
            .context("Failed to write output header")?;

        let to_yuv = scaling::Context::get(
            format::Pixel::RGB24,
            info.width,
            info.height,
            ENCODE_FORMAT,
            info.width,
            info.height,
            scaling::Flags::BILINEAR,
        )
        .context("Failed to create to-YUV scaler")?;

        tracing::info!(
            "Writing {}x{} @ {:.3} fps to {}",
            info.width,
            info.height,
            info.fps,
            path.display()
        );

        Ok(Self {
            output,
            encoder,
            to_yuv,
            rgb: frame::Video::new(format::Pixel::RGB24, info.width, info.height),
            yuv: frame::Video::empty(),
            stream_index,
            time_base,
            width: info.width,
            height: info.height,
            next_pts: 0,
        })
    }

    /// Drain all pending packets from the encoder into the muxer.
    fn drain(&mut self) -> Result<()> {
        let stream_time_base = self
            .output
            .stream(self.stream_index)
            .context("output stream disappeared")?
            .time_base();

        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            // One frame per packet, so the muxed duration reflects the rate
            if packet.duration() <= 0 {
                packet.set_duration(1);
            }
            packet.rescale_ts(self.time_base, stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("Failed to write encoded packet")?;
        }
        Ok(())
    }
}

impl FrameSink for FfmpegWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        ensure!(
            frame.dimensions() == (self.width, self.height),
            "frame is {}x{}, output stream is {}x{}",
            frame.width(),
            frame.height(),
            self.width,
            self.height
        );

        let row_len = self.width as usize * 3;
        let stride = self.rgb.stride(0);
        let plane = self.rgb.data_mut(0);
        for (row, src) in frame.as_raw().chunks_exact(row_len).enumerate() {
            let start = row * stride;
            plane[start..start + row_len].copy_from_slice(src);
        }

        self.to_yuv
            .run(&self.rgb, &mut self.yuv)
            .context("to-YUV scaling failed")?;
        self.yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&self.yuv)
            .context("Encoder rejected frame")?;
        self.drain()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.encoder.send_eof().context("Failed to flush encoder")?;
        self.drain()?;
        self.output
            .write_trailer()
            .context("Failed to write output trailer")?;
        tracing::debug!("Closed output after {} frames", self.next_pts);
        Ok(())
    }
}
