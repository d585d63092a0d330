use super::types::{Detection, DetectionModel};
use crate::inference::yolo::{decode_candidates, nms, parse_class_names, HeadLayout};
use crate::inference::{build_session, InferenceOptions, Preprocessor};
use anyhow::{Context, Result};
use image::RgbImage;
use ort::session::Session;
use std::collections::HashMap;
use std::path::Path;

/// YOLOv8 object detector exported to ONNX
///
/// Class names are read from the `names` metadata the Ultralytics exporter
/// embeds; ids missing from it are labelled with their numeric id.
pub struct YoloDetector {
    session: Session,
    preprocessor: Preprocessor,
    options: InferenceOptions,
    class_names: HashMap<usize, String>,
}

impl YoloDetector {
    pub fn new<P: AsRef<Path>>(model_path: P, options: InferenceOptions) -> Result<Self> {
        let path = model_path.as_ref();
        let session = build_session(path, &options)?;

        let raw_names = session
            .metadata()
            .context("Failed to read model metadata")?
            .custom("names")
            .context("Failed to read class names from model metadata")?;
        let class_names = match raw_names.as_deref().map(parse_class_names) {
            Some(Ok(names)) => names,
            Some(Err(e)) => {
                tracing::warn!("Ignoring class names in {}: {:#}", path.display(), e);
                HashMap::new()
            }
            None => HashMap::new(),
        };

        if class_names.is_empty() {
            tracing::warn!(
                "{} carries no class names; labels will be numeric",
                path.display()
            );
        } else {
            tracing::info!("Detector classes: {:?}", class_names);
        }

        let preprocessor = Preprocessor::new(options.input_size, options.input_size);

        Ok(Self {
            session,
            preprocessor,
            options,
            class_names,
        })
    }

    fn label_for(&self, class_id: usize) -> String {
        self.class_names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }
}

impl DetectionModel for YoloDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let _span = tracing::debug_span!("yolo_detect").entered();

        let tensor = self.preprocessor.to_tensor(frame)?;

        let (dims, head) = {
            let _infer_span = tracing::debug_span!("inference").entered();
            let outputs = self
                .session
                .run(ort::inputs!["images" => tensor])
                .context("Failed to run detector inference")?;
            let (shape, data) = outputs["output0"]
                .try_extract_tensor::<f32>()
                .context("Failed to extract detector output tensor")?;
            (shape.iter().copied().collect::<Vec<i64>>(), data.to_vec())
        };

        let _post_span = tracing::debug_span!("postprocess").entered();
        let layout = HeadLayout::from_shape(&dims, 0)?;
        let candidates = decode_candidates(
            &head,
            layout,
            self.options.input_size,
            self.options.conf_threshold,
        )?;
        let kept = nms(
            candidates,
            self.options.iou_threshold,
            self.options.max_detections,
        );

        let (sx, sy) = self.preprocessor.scale_to(frame.width(), frame.height());
        let detections = kept
            .into_iter()
            .map(|c| Detection::new(c.bbox.scaled(sx, sy), self.label_for(c.class_id), c.score))
            .collect::<Vec<_>>();

        tracing::debug!("Detected {} objects", detections.len());
        Ok(detections)
    }

    fn input_size(&self) -> (u32, u32) {
        self.preprocessor.target_size()
    }
}
