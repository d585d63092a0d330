use anyhow::{ensure, Context, Result};
use image::{imageops, GrayImage, RgbImage};
use ndarray::Array4;
use ort::value::Tensor;

/// Resampling used for model input and for mask rescaling (bilinear).
const RESIZE_FILTER: imageops::FilterType = imageops::FilterType::Triangle;

/// Preprocessor for converting RGB frames to model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Stretch `image` to the model input size and lay it out as a
    /// `[1, 3, height, width]` array of RGB values in [0, 1].
    ///
    /// No letterboxing: outputs map back onto the frame with a plain
    /// per-axis scale (see [`Preprocessor::scale_to`]).
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        ensure!(
            image.width() > 0 && image.height() > 0,
            "cannot preprocess an empty frame"
        );

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(image, self.target_width, self.target_height, RESIZE_FILTER)
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            tensor[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }

        Ok(tensor)
    }

    /// Preprocess and wrap the result as an ONNX Runtime input tensor.
    pub fn to_tensor(&self, image: &RgbImage) -> Result<Tensor<f32>> {
        let array = self.preprocess(image)?;
        let (n, c, h, w) = array.dim();
        let (data, _offset) = array.into_raw_vec_and_offset();
        let tensor = Tensor::from_array(([n, c, h, w], data.into_boxed_slice()))
            .context("Failed to create model input tensor")?;
        Ok(tensor)
    }

    /// Scale factors mapping model-input coordinates back onto a frame.
    pub fn scale_to(&self, frame_width: u32, frame_height: u32) -> (f32, f32) {
        (
            frame_width as f32 / self.target_width as f32,
            frame_height as f32 / self.target_height as f32,
        )
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}

/// Resize a single-channel mask to the given dimensions with bilinear
/// filtering. Returns the input unchanged when it already matches.
pub fn resize_mask(mask: &GrayImage, target_width: u32, target_height: u32) -> GrayImage {
    if mask.dimensions() == (target_width, target_height) {
        return mask.clone();
    }
    imageops::resize(mask, target_width, target_height, RESIZE_FILTER)
}
