use anyhow::Result;
use image::{GrayImage, RgbImage};

/// Binary lane-instance raster: 255 inside the instance, 0 outside.
///
/// Masks come back at the model's input resolution; the annotator rescales
/// them to the frame before compositing.
pub type SegmentationMask = GrayImage;

/// A lane segmenter. Implemented by the ONNX backend and by test doubles.
pub trait SegmentationModel: Send {
    /// One mask per lane instance found in `frame`, in detection order.
    /// An empty vector means no lanes, not an error.
    fn segment(&mut self, frame: &RgbImage) -> Result<Vec<SegmentationMask>>;

    /// (width, height) the model resizes frames to
    fn input_size(&self) -> (u32, u32);

    /// (width, height) of the returned masks
    fn output_size(&self) -> (u32, u32) {
        self.input_size()
    }
}
