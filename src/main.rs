use anyhow::{Context, Result};
use clap::Parser;
use roadlens::annotate::Annotator;
use roadlens::config::Args;
use roadlens::pipeline::{Models, Pipeline};
use roadlens::{detection, segmentation, server, video};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Roadlens starting");
    tracing::info!("Lane model: {}", args.lane_model.display());
    tracing::info!("Vehicle model: {}", args.vehicle_model.display());

    let options = args.inference_options();

    // Models are loaded once and injected into the pipeline
    let lane = segmentation::create_default_model(&args.lane_model, options.clone())
        .context("Failed to load lane segmentation model")?;
    tracing::info!(
        "Lane model ready, input {:?}, masks {:?}",
        lane.input_size(),
        lane.output_size()
    );

    let vehicle = detection::create_default_model(&args.vehicle_model, options)
        .context("Failed to load vehicle detection model")?;
    tracing::info!("Vehicle model ready, input {:?}", vehicle.input_size());

    let annotator = Annotator::from_font_override(args.font.as_deref())?;

    #[cfg(not(feature = "ffmpeg"))]
    tracing::warn!("Built without the `ffmpeg` feature; /vehicle-video will reject uploads");

    let staging_dir = args.staging_dir();
    tracing::info!("Staging videos under {}", staging_dir.display());

    let pipeline = Arc::new(Pipeline::new(
        Models::new(lane, vehicle),
        annotator,
        video::default_codec(),
        staging_dir,
    ));

    let app = server::router(pipeline, args.max_body_bytes());
    server::serve(args.bind, app).await
}
