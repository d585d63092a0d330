use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failure kinds surfaced at the request boundary.
///
/// Every variant is rendered as `{"error": "<message>"}`; nothing here is
/// retried.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    MissingInput(String),
    #[error("Failed to decode input: {0}")]
    Decode(String),
    #[error("Model inference failed: {0:#}")]
    ModelInference(anyhow::Error),
    #[error("Failed to encode output: {0}")]
    Encode(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Not supported by this build: {0}")]
    Unsupported(String),
}

impl PipelineError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(format!("{err:#}"))
    }

    pub fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(format!("{err:#}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingInput(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::ModelInference(_) | Self::Encode(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
