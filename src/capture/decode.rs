use crate::error::PipelineError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;

/// Decode uploaded image bytes (any format the `image` crate recognises)
/// into a 3-channel RGB frame. Alpha is dropped.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::Decode("uploaded image is empty".into()));
    }
    let image = image::load_from_memory(bytes).map_err(PipelineError::decode)?;
    let frame = image.into_rgb8();
    if frame.width() == 0 || frame.height() == 0 {
        return Err(PipelineError::Decode("uploaded image has no pixels".into()));
    }
    tracing::debug!("Decoded {}x{} image", frame.width(), frame.height());
    Ok(frame)
}

/// Decode the base64 `video` field into container bytes.
///
/// Whitespace is ignored and an optional `data:<mime>;base64,` prefix is
/// stripped.
pub fn decode_video_payload(payload: &str) -> Result<Vec<u8>, PipelineError> {
    let body = match payload.trim_start().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| PipelineError::Decode("malformed data URL in video field".into()))?,
        None => payload,
    };

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(PipelineError::Decode("video payload is empty".into()));
    }

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| PipelineError::Decode(format!("video field is not valid base64: {e}")))
}
