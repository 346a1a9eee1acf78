//! Tract segmentation backend
//!
//! Runs an ISNet-style salient-object model (single RGB input, mask output
//! in `[N, 1, H, W]`) through Tract, a pure Rust ONNX runtime. The model
//! file is supplied through configuration; nothing is downloaded.

use crate::{
    config::SegmentationConfig,
    error::SegmentationError,
    segmentation::{Segmenter, SegmenterFactory},
    services::ImageIOService,
    types::{AlphaMask, RasterImage},
};
use image::{imageops::FilterType, GrayImage, RgbImage};
use instant::Instant;
use tracing::{debug, info};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Segmenter backed by an optimized Tract plan
#[derive(Debug)]
pub struct TractSegmenter {
    model: TractModel,
    input_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl TractSegmenter {
    /// Load and optimize the configured model
    ///
    /// # Errors
    /// - [`SegmentationError::Unavailable`] when no model path is configured,
    ///   the file is missing, or Tract cannot build a runnable plan from it
    pub fn load(config: &SegmentationConfig) -> Result<Self, SegmentationError> {
        let path = config
            .model_path
            .as_ref()
            .ok_or_else(|| SegmentationError::unavailable("no segmentation model configured"))?;
        if !path.is_file() {
            return Err(SegmentationError::unavailable(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let load_start = Instant::now();
        let size = config.input_size as usize;
        info!(model = %path.display(), input_size = size, "Loading Tract segmentation model");

        let model = onnx()
            .model_for_path(path)
            .map_err(|e| SegmentationError::unavailable(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| SegmentationError::unavailable(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| SegmentationError::unavailable(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                SegmentationError::unavailable(format!("Failed to create runnable model: {e}"))
            })?;

        info!(
            elapsed_ms = load_start.elapsed().as_millis() as u64,
            "Tract segmentation model ready"
        );

        Ok(Self {
            model,
            input_size: config.input_size,
            mean: config.normalization_mean,
            std: config.normalization_std,
        })
    }

    /// Resize to the model input and normalise to `(px / 255 - mean) / std`
    fn preprocess(&self, rgb: &RgbImage) -> Tensor {
        let size = self.input_size;
        let resized = image::imageops::resize(rgb, size, size, FilterType::Triangle);
        let side = size as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let value = f32::from(resized.get_pixel(x as u32, y as u32)[c]) / 255.0;
            (value - self.mean[c]) / self.std[c]
        })
        .into_tensor()
    }

    /// Min-max normalised mask at model resolution
    fn infer(&self, input: Tensor) -> Result<GrayImage, SegmentationError> {
        let inference_start = Instant::now();
        let outputs = self
            .model
            .run(tvec![input.into()])
            .map_err(|e| SegmentationError::backend(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| SegmentationError::backend("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| SegmentationError::backend(format!("Failed to read output tensor: {e}")))?;
        let shape = view.shape().to_vec();
        let view = view
            .into_dimensionality::<tract_ndarray::Ix4>()
            .map_err(|_| {
                SegmentationError::backend(format!("expected 4D mask output, got {shape:?}"))
            })?;
        if shape[1] != 1 {
            return Err(SegmentationError::backend(format!(
                "expected [N, 1, H, W] mask output, got {shape:?}"
            )));
        }
        let (height, width) = (shape[2], shape[3]);

        let (lo, hi) = view
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = if hi - lo > f32::EPSILON { hi - lo } else { 1.0 };

        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (y, x)))
            .map(|(y, x)| {
                let normalized = (view[[0, 0, y, x]] - lo) / range;
                (normalized * 255.0).round().clamp(0.0, 255.0) as u8
            })
            .collect();

        debug!(
            output_shape = ?shape,
            elapsed_ms = inference_start.elapsed().as_millis() as u64,
            "Tract inference finished"
        );

        GrayImage::from_raw(width as u32, height as u32, data)
            .ok_or_else(|| SegmentationError::backend("mask buffer does not match output shape"))
    }
}

impl Segmenter for TractSegmenter {
    fn name(&self) -> &str {
        "tract"
    }

    fn remove_background(&self, png_rgb: &[u8]) -> Result<Vec<u8>, SegmentationError> {
        let decoded = image::load_from_memory(png_rgb)
            .map_err(|e| SegmentationError::backend(format!("Failed to decode input: {e}")))?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        let mask = self.infer(self.preprocess(&rgb))?;
        let mask = AlphaMask::from_luma(image::imageops::resize(
            &mask,
            width,
            height,
            FilterType::Triangle,
        ));

        let cutout = RasterImage::from_dynamic(&decoded)
            .and_then(|raster| raster.with_alpha(&mask))
            .map_err(|e| SegmentationError::backend(e.to_string()))?;
        ImageIOService::encode_png(&cutout).map_err(|e| SegmentationError::backend(e.to_string()))
    }
}

/// Factory that loads a [`TractSegmenter`] on first use
#[derive(Debug, Clone)]
pub struct TractSegmenterFactory {
    config: SegmentationConfig,
}

impl TractSegmenterFactory {
    #[must_use]
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }
}

impl SegmenterFactory for TractSegmenterFactory {
    fn create(&self) -> Result<Box<dyn Segmenter>, SegmentationError> {
        Ok(Box::new(TractSegmenter::load(&self.config)?))
    }
}
