use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Multipart field carrying the uploaded image.
const IMAGE_FIELD: &str = "image";
/// JSON field carrying the base64 video.
const VIDEO_FIELD: &str = "video";

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub status: &'static str,
    pub frames_processed: u64,
    pub processed_video: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `POST /predict-image`
pub async fn predict_image(
    State(pipeline): State<Arc<Pipeline>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageResponse>, PipelineError> {
    let mut multipart = multipart.map_err(|e| missing_image(&e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::Decode(e.body_text()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| PipelineError::Decode(e.body_text()))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| missing_image("no `image` field in form"))?;

    tracing::info!("Received image upload ({} bytes)", bytes.len());
    let image = run_blocking(move || pipeline.process_image(&bytes)).await?;
    Ok(Json(ImageResponse { image }))
}

/// `POST /vehicle-video`
pub async fn vehicle_video(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> Result<Json<VideoResponse>, PipelineError> {
    let payload = extract_video_field(&body)?;
    drop(body);

    tracing::info!("Received video upload ({} base64 chars)", payload.len());
    let outcome = run_blocking(move || pipeline.process_video(&payload)).await?;

    Ok(Json(VideoResponse {
        status: "success",
        frames_processed: outcome.frames_processed,
        processed_video: outcome.processed_video,
    }))
}

fn missing_image(detail: &str) -> PipelineError {
    PipelineError::MissingInput(format!("Image not found: {detail}"))
}

/// Pull the `video` string out of a JSON body.
fn extract_video_field(body: &[u8]) -> Result<String, PipelineError> {
    let missing = || PipelineError::MissingInput("No video data received".into());

    let value: Value = serde_json::from_slice(body).map_err(|_| missing())?;
    match value.get(VIDEO_FIELD) {
        None | Some(Value::Null) => Err(missing()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(PipelineError::Decode(
            "`video` must be a base64-encoded string".into(),
        )),
    }
}

/// Run synchronous pipeline work on the blocking pool.
async fn run_blocking<T, F>(work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::Internal(format!("pipeline task failed: {e}")))?
}
