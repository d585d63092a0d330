use super::FrameSource;
use crate::video::StreamInfo;
use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, decoder, format, frame, media, software::scaling, Packet};
use image::RgbImage;
use std::path::Path;

/// Sequential decoder for the best video stream of a container file,
/// yielding RGB frames at the source resolution.
pub struct FfmpegReader {
    input: format::context::Input,
    decoder: decoder::Video,
    to_rgb: scaling::Context,
    stream_index: usize,
    info: StreamInfo,
    decoded: frame::Video,
    rgb: frame::Video,
    eof_sent: bool,
}

impl FfmpegReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ffmpeg::init().context("Failed to initialise FFmpeg")?;

        let input = format::input(path)
            .with_context(|| format!("Could not open video container {}", path.display()))?;

        let stream = input
            .streams()
            .best(media::Type::Video)
            .context("No video stream found in input")?;
        let stream_index = stream.index();

        let mut rate = stream.avg_frame_rate();
        if rate.numerator() <= 0 || rate.denominator() <= 0 {
            rate = stream.rate();
        }
        let fps = if rate.denominator() > 0 {
            f64::from(rate)
        } else {
            0.0
        };

        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .context("Failed to build decoder context")?
            .decoder()
            .video()
            .context("Failed to open video decoder")?;

        let info = StreamInfo::new(decoder.width(), decoder.height(), fps);
        info.validate()?;

        tracing::info!(
            "Opened video stream {}x{} @ {:.3} fps ({:?})",
            info.width,
            info.height,
            info.fps,
            decoder.format()
        );

        let to_rgb = scaling::Context::get(
            decoder.format(),
            info.width,
            info.height,
            format::Pixel::RGB24,
            info.width,
            info.height,
            scaling::Flags::BILINEAR,
        )
        .context("Failed to create to-RGB scaler")?;

        Ok(Self {
            input,
            decoder,
            to_rgb,
            stream_index,
            info,
            decoded: frame::Video::empty(),
            rgb: frame::Video::empty(),
            eof_sent: false,
        })
    }

    /// Copy the scaled RGB plane into a tightly packed image, dropping any
    /// stride padding.
    fn take_rgb(&mut self) -> Result<RgbImage> {
        self.to_rgb
            .run(&self.decoded, &mut self.rgb)
            .context("to-RGB scaling failed")?;

        let (width, height) = (self.info.width as usize, self.info.height as usize);
        let stride = self.rgb.stride(0);
        let plane = self.rgb.data(0);
        let mut data = Vec::with_capacity(width * height * 3);
        for row in 0..height {
            let start = row * stride;
            data.extend_from_slice(&plane[start..start + width * 3]);
        }

        RgbImage::from_raw(self.info.width, self.info.height, data)
            .context("decoded frame does not match stream dimensions")
    }
}

/// What a `receive_frame` call reported.
#[derive(Debug, PartialEq, Eq)]
enum Receive {
    Frame,
    NeedsInput,
    Drained,
}

/// Sort a `receive_frame` result; real decode errors are propagated.
fn classify_receive(result: std::result::Result<(), ffmpeg::Error>) -> Result<Receive> {
    match result {
        Ok(()) => Ok(Receive::Frame),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {
            Ok(Receive::NeedsInput)
        }
        Err(ffmpeg::Error::Eof) => Ok(Receive::Drained),
        Err(e) => Err(e).context("Failed to decode frame"),
    }
}

impl FrameSource for FfmpegReader {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        loop {
            match classify_receive(self.decoder.receive_frame(&mut self.decoded))? {
                Receive::Frame => return self.take_rgb().map(Some),
                Receive::Drained => return Ok(None),
                Receive::NeedsInput if self.eof_sent => {
                    anyhow::bail!("decoder wants input after end of stream")
                }
                Receive::NeedsInput => {}
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .context("Decoder rejected packet")?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof().context("Failed to flush decoder")?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(e).context("Failed to read packet"),
            }
        }
    }

    fn info(&self) -> StreamInfo {
        self.info
    }
}
