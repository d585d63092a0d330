use super::types::{SegmentationMask, SegmentationModel};
use crate::detection::BBox;
use crate::inference::yolo::{decode_candidates, nms, HeadLayout};
use crate::inference::{build_session, resize_mask, InferenceOptions, Preprocessor};
use anyhow::{ensure, Context, Result};
use image::{GrayImage, Luma, RgbImage};
use ndarray::{ArrayView1, ArrayView2};
use ort::session::Session;
use std::path::Path;

/// Mask probability above which a pixel belongs to the instance.
const MASK_THRESHOLD: u8 = 128;

/// YOLOv8 instance segmentation model exported to ONNX
///
/// `output0` carries boxes, class scores and 32 mask coefficients per
/// proposal; `output1` carries the prototype masks the coefficients combine.
pub struct YoloSegmenter {
    session: Session,
    preprocessor: Preprocessor,
    options: InferenceOptions,
}

impl YoloSegmenter {
    /// Load a YOLOv8-seg model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `options` - Input size and postprocessing thresholds
    pub fn new<P: AsRef<Path>>(model_path: P, options: InferenceOptions) -> Result<Self> {
        let session = build_session(model_path.as_ref(), &options)?;
        tracing::info!("Segmentation model loaded successfully");

        let preprocessor = Preprocessor::new(options.input_size, options.input_size);

        Ok(Self {
            session,
            preprocessor,
            options,
        })
    }
}

impl SegmentationModel for YoloSegmenter {
    fn segment(&mut self, frame: &RgbImage) -> Result<Vec<SegmentationMask>> {
        let _span = tracing::debug_span!("yolo_segment").entered();

        let tensor = self.preprocessor.to_tensor(frame)?;

        let (head_dims, head, proto_dims, proto_data) = {
            let _infer_span = tracing::debug_span!("inference").entered();
            let outputs = self
                .session
                .run(ort::inputs!["images" => tensor])
                .context("Failed to run segmentation inference")?;
            let (head_shape, head) = outputs["output0"]
                .try_extract_tensor::<f32>()
                .context("Failed to extract segmentation head tensor")?;
            let (proto_shape, protos) = outputs["output1"]
                .try_extract_tensor::<f32>()
                .context("Failed to extract prototype mask tensor")?;
            (
                head_shape.iter().copied().collect::<Vec<i64>>(),
                head.to_vec(),
                proto_shape.iter().copied().collect::<Vec<i64>>(),
                protos.to_vec(),
            )
        };

        let _post_span = tracing::debug_span!("postprocess").entered();

        // Prototypes: [1, nm, mh, mw]
        ensure!(
            proto_dims.len() == 4 && proto_dims[0] == 1,
            "unexpected prototype shape {:?}",
            proto_dims
        );
        let num_coeffs = usize::try_from(proto_dims[1])?;
        let proto_height = u32::try_from(proto_dims[2])?;
        let proto_width = u32::try_from(proto_dims[3])?;
        let protos = ArrayView2::from_shape(
            (num_coeffs, (proto_width * proto_height) as usize),
            &proto_data,
        )
        .context("prototype tensor does not match its shape")?;

        let layout = HeadLayout::from_shape(&head_dims, num_coeffs)?;
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

        let masks = kept
            .iter()
            .map(|c| {
                assemble_mask(
                    &c.coeffs,
                    &protos,
                    proto_width,
                    proto_height,
                    c.bbox,
                    self.options.input_size,
                )
            })
            .collect::<Vec<_>>();

        tracing::debug!("Segmented {} instances", masks.len());
        Ok(masks)
    }

    fn input_size(&self) -> (u32, u32) {
        self.preprocessor.target_size()
    }
}

/// Combine prototypes with one instance's coefficients into a binary mask at
/// `input_size`²: sigmoid of the linear combination, zeroed outside the
/// instance box, bilinearly upsampled, then thresholded at 0.5.
fn assemble_mask(
    coeffs: &[f32],
    protos: &ArrayView2<f32>,
    proto_width: u32,
    proto_height: u32,
    bbox: BBox,
    input_size: u32,
) -> SegmentationMask {
    let logits = ArrayView1::from(coeffs).dot(protos);

    let crop = bbox.scaled(
        proto_width as f32 / input_size as f32,
        proto_height as f32 / input_size as f32,
    );

    let probabilities = GrayImage::from_fn(proto_width, proto_height, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        if fx < crop.x1 || fx >= crop.x2 || fy < crop.y1 || fy >= crop.y2 {
            return Luma([0]);
        }
        let logit = logits[(y * proto_width + x) as usize];
        let p = 1.0 / (1.0 + (-logit).exp());
        Luma([(p * 255.0).round() as u8])
    });

    let mut mask = resize_mask(&probabilities, input_size, input_size);
    for pixel in mask.pixels_mut() {
        pixel[0] = if pixel[0] >= MASK_THRESHOLD { 255 } else { 0 };
    }
    mask
}
