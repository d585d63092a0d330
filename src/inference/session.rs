use super::InferenceOptions;
use anyhow::{Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;

/// Build an ONNX Runtime session for `model_path`.
///
/// CUDA / TensorRT execution providers are registered when the matching cargo
/// feature is enabled; ONNX Runtime falls back to CPU if they fail to load.
pub fn build_session(model_path: &Path, options: &InferenceOptions) -> Result<Session> {
    tracing::info!("Loading ONNX model from {}", model_path.display());

    let mut builder = Session::builder().context("Failed to create ORT session builder")?;
    builder = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set ORT optimization level")?;
    builder = builder
        .with_intra_threads(options.intra_threads)
        .context("Failed to set ORT intra threads")?;

    #[cfg(any(feature = "cuda", feature = "tensorrt"))]
    {
        use ort::execution_providers as ep;
        builder = builder
            .with_execution_providers([
                #[cfg(feature = "tensorrt")]
                ep::TensorRTExecutionProvider::default().build(),
                #[cfg(feature = "cuda")]
                ep::CUDAExecutionProvider::default().build(),
            ])
            .context("Failed to register execution providers")?;
    }

    let session = builder
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;

    tracing::debug!("ONNX session ready: {}", model_path.display());

    Ok(session)
}
