use crate::inference::resize_mask;
use crate::segmentation::SegmentationMask;
use image::RgbImage;

/// Channel the mask intensity is written to (blue in RGB order).
pub const MASK_CHANNEL: usize = 2;
/// Weight of the running output in the blend.
pub const FRAME_WEIGHT: f32 = 1.0;
/// Weight of the mask layer in the blend.
pub const MASK_WEIGHT: f32 = 0.5;
/// Constant added after weighting.
pub const BLEND_OFFSET: f32 = 0.0;

/// Blend every mask into `frame`, one after the other.
///
/// Each mask is rescaled to the frame, turned into a layer that carries the
/// mask intensity in [`MASK_CHANNEL`] and zero elsewhere, and blended as
/// `out = FRAME_WEIGHT * out + MASK_WEIGHT * layer + BLEND_OFFSET`, rounded
/// half-to-even and saturated to [0, 255]. Later masks blend into the
/// already-blended result.
pub fn composite_masks(frame: &mut RgbImage, masks: &[SegmentationMask]) {
    let (width, height) = frame.dimensions();
    for mask in masks {
        let mask = resize_mask(mask, width, height);
        for (pixel, m) in frame.pixels_mut().zip(mask.pixels()) {
            for (channel, value) in pixel.0.iter_mut().enumerate() {
                let layer = if channel == MASK_CHANNEL { m[0] } else { 0 };
                *value = blend(*value, layer);
            }
        }
    }
}

fn blend(out: u8, layer: u8) -> u8 {
    let v = FRAME_WEIGHT * out as f32 + MASK_WEIGHT * layer as f32 + BLEND_OFFSET;
    v.round_ties_even().clamp(0.0, 255.0) as u8
}
