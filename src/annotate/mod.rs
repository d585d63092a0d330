//! Frame annotation: lane masks composited in blue, vehicle boxes and
//! captions drawn in green.
//!
//! The blend weights and drawing constants are kept literal so output stays
//! pixel-compatible with earlier deployments of the service.

mod draw;
mod overlay;

pub use draw::{draw_box, BOX_COLOR, BOX_THICKNESS, LABEL_COLOR};
pub use overlay::{composite_masks, MASK_CHANNEL, MASK_WEIGHT};

use crate::detection::Detection;
use crate::segmentation::SegmentationMask;
use ab_glyph::FontArc;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

/// DejaVu Sans, shipped with the binary so captions never depend on the host.
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Draws model outputs onto frames.
pub struct Annotator {
    font: FontArc,
}

impl Annotator {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// Caption with the font compiled into the binary.
    pub fn bundled() -> Result<Self> {
        let font = FontArc::try_from_slice(BUNDLED_FONT).context("Bundled label font is invalid")?;
        Ok(Self::new(font))
    }

    /// Load the caption font from a TTF/OTF file.
    pub fn with_font_path(font_path: &Path) -> Result<Self> {
        let data = std::fs::read(font_path)
            .with_context(|| format!("Failed to read font file {}", font_path.display()))?;
        let font = FontArc::try_from_vec(data)
            .with_context(|| format!("Failed to parse font file {}", font_path.display()))?;
        tracing::info!("Loaded label font: {}", font_path.display());
        Ok(Self::new(font))
    }

    /// `font_path` when given, the bundled font otherwise.
    pub fn from_font_override(font_path: Option<&Path>) -> Result<Self> {
        match font_path {
            Some(path) => Self::with_font_path(path),
            None => Self::bundled(),
        }
    }

    /// Composite `masks` and draw `detections` onto `frame`.
    ///
    /// Masks are blended first, then boxes and captions drawn on top, each in
    /// the order given. Empty inputs skip their stage, so
    /// `annotate(f, &[], &[]) == f`. The output always has the input's
    /// dimensions.
    pub fn annotate(
        &self,
        mut frame: RgbImage,
        masks: &[SegmentationMask],
        detections: &[Detection],
    ) -> RgbImage {
        let _span = tracing::debug_span!("annotate").entered();

        if !masks.is_empty() {
            composite_masks(&mut frame, masks);
        }
        if !detections.is_empty() {
            draw::draw_detections(&mut frame, detections, &self.font);
        }
        frame
    }
}
