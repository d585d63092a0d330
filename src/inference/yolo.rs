//! Decoding of YOLOv8 output heads.
//!
//! Detection head `output0` is `[1, 4 + nc, N]`; the segmentation variant
//! appends `nm` mask coefficients per proposal, giving `[1, 4 + nc + nm, N]`.
//! Rows are stored channel-major, so value `c` of proposal `i` lives at
//! `c * N + i`.

use crate::detection::BBox;
use anyhow::{ensure, Context, Result};
use std::collections::HashMap;

/// A proposal that survived the confidence threshold, still in model input space.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub bbox: BBox,
    pub class_id: usize,
    pub score: f32,
    pub coeffs: Vec<f32>,
}

/// Layout of a YOLOv8 head.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeadLayout {
    pub num_classes: usize,
    pub num_coeffs: usize,
    pub num_proposals: usize,
}

impl HeadLayout {
    /// Derive the layout from the `output0` shape, given how many mask
    /// coefficients the model carries (0 for plain detection).
    pub fn from_shape(shape: &[i64], num_coeffs: usize) -> Result<Self> {
        ensure!(
            shape.len() == 3 && shape[0] == 1,
            "unexpected YOLO output shape {:?}",
            shape
        );
        let channels = usize::try_from(shape[1])?;
        let num_proposals = usize::try_from(shape[2])?;
        ensure!(
            channels > 4 + num_coeffs,
            "YOLO output has {} channels, too few for 4 box values, {} mask coefficients and at least one class",
            channels,
            num_coeffs
        );
        Ok(Self {
            num_classes: channels - 4 - num_coeffs,
            num_coeffs,
            num_proposals,
        })
    }

    fn channels(&self) -> usize {
        4 + self.num_classes + self.num_coeffs
    }
}

/// Turn raw head output into candidates scoring at least `conf_threshold`.
///
/// Boxes are converted from centre/size to corners and clamped to the
/// `input_size` square.
pub(crate) fn decode_candidates(
    data: &[f32],
    layout: HeadLayout,
    input_size: u32,
    conf_threshold: f32,
) -> Result<Vec<Candidate>> {
    let n = layout.num_proposals;
    ensure!(
        data.len() == layout.channels() * n,
        "YOLO output holds {} values, expected {}",
        data.len(),
        layout.channels() * n
    );

    let limit = input_size as f32;
    let mut candidates = Vec::new();

    for i in 0..n {
        let (class_id, score) = (0..layout.num_classes)
            .map(|c| (c, data[(4 + c) * n + i]))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score < conf_threshold {
            continue;
        }

        let cx = data[i];
        let cy = data[n + i];
        let w = data[2 * n + i];
        let h = data[3 * n + i];

        let bbox = BBox::new(
            (cx - w / 2.0).clamp(0.0, limit),
            (cy - h / 2.0).clamp(0.0, limit),
            (cx + w / 2.0).clamp(0.0, limit),
            (cy + h / 2.0).clamp(0.0, limit),
        );

        let coeff_base = 4 + layout.num_classes;
        let coeffs = (0..layout.num_coeffs)
            .map(|k| data[(coeff_base + k) * n + i])
            .collect();

        candidates.push(Candidate {
            bbox,
            class_id,
            score,
            coeffs,
        });
    }

    Ok(candidates)
}

/// Greedy class-aware NMS: sort by score descending and suppress any later
/// box of the same class overlapping a kept one by more than `iou_threshold`.
pub(crate) fn nms(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

/// Parse the `names` metadata entry written by the Ultralytics exporter,
/// e.g. `{0: 'car', 1: 'truck'}`. The entry is a YAML flow mapping.
pub(crate) fn parse_class_names(raw: &str) -> Result<HashMap<usize, String>> {
    serde_yaml::from_str(raw).context("class names are not an id -> name mapping")
}
