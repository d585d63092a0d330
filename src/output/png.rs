use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Encode a frame as PNG.
pub fn encode_png(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    frame
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode frame as PNG")?;
    Ok(bytes)
}

/// Encode a frame as PNG and return the bytes as standard base64.
pub fn encode_png_base64(frame: &RgbImage) -> Result<String> {
    let _span = tracing::debug_span!("encode_png").entered();
    Ok(STANDARD.encode(encode_png(frame)?))
}
