pub mod annotate;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod segmentation;
pub mod server;
pub mod video;

pub use error::PipelineError;
pub use pipeline::{Models, Pipeline, VideoOutcome};
