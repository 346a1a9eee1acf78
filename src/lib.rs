#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Cutout Pipeline
//!
//! Post-processing for segmented product photos: repair a cutout whose
//! background was not removed cleanly, crop it to its subject, soften the
//! alpha edge, and optionally composite a drop shadow for collage layouts.
//!
//! ## Features
//!
//! - **Segmentation adapter**: any [`Segmenter`] behind a lazily initialised,
//!   process-wide [`SegmentationSession`]; a Tract ONNX backend is bundled
//! - **Cutout validation**: transparency check and residual black/white backdrop detection
//! - **Background inference**: modal colour of the border samples
//! - **Mask refinement**: vectorized (ndarray) and scalar refiners producing identical masks
//! - **Autocrop**: tight crop on any alpha, then on meaningful alpha
//! - **Edge smoothing**: Gaussian blur of the alpha channel only
//! - **Drop shadows**: blurred, tinted, offset silhouette under the subject
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout_pipeline::{
//!     CutoutPipeline, ImageIOService, PipelineConfig, SegmentationSession, ShadowSpec,
//! };
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .model_path("models/isnet.onnx")
//!     .shadow(ShadowSpec::collage(70))
//!     .build()?;
//!
//! // One session per process, shared by every pipeline
//! let session = Arc::new(SegmentationSession::from_config(&config.segmentation));
//! let pipeline = CutoutPipeline::new(config, session)?;
//!
//! let image = ImageIOService::load("product.jpg")?;
//! let result = pipeline.process(image)?;
//! println!("{:?}", result.report.repair);
//! ImageIOService::save_png(&result.image, "product_cutout.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): bundled pure Rust ONNX segmentation backend
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `test-utils`: exports the mock segmenter for downstream and integration tests
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! cutout-pipeline = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod background;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod crop;
pub mod error;
pub mod pipeline;
pub mod refine;
pub mod segmentation;
pub mod services;
pub mod shadow;
pub mod smooth;
#[cfg(test)]
mod test_support;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod validation;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
#[cfg(any(test, feature = "test-utils"))]
pub use backends::{MockSegmenter, MockSegmenterFactory};
#[cfg(feature = "tract")]
pub use backends::{TractSegmenter, TractSegmenterFactory};
pub use config::{PipelineConfig, PipelineConfigBuilder, RefineStrategy, SegmentationConfig, Thresholds};
pub use crop::{autocrop, CropOutcome};
pub use error::{CutoutError, Result, SegmentationError, ShadowError};
pub use pipeline::{
    CutoutPipeline, CutoutResult, PipelineReport, ProcessOptions, RepairOutcome,
    DEFAULT_SHADOW_INTENSITY,
};
pub use refine::{apply_mask, refiner_for, MaskRefiner, RefineParams, ScalarRefiner, VectorizedRefiner};
pub use segmentation::{
    segment, SegmentationOutcome, SegmentationSession, Segmenter, SegmenterFactory,
};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressUpdate,
};
pub use shadow::{add_shadow, apply_shadow, create_placeholder, ShadowOutcome};
pub use smooth::smooth_edges;
pub use types::{AlphaMask, BoundingBox, Color, ProcessingTimings, RasterImage, ShadowSpec};
pub use validation::{detect_residual_backdrop, has_transparency, Backdrop};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Run the pipeline on encoded image bytes
///
/// Builds a one-off segmentation session from `config`; long-running callers
/// should create a [`CutoutPipeline`] once and reuse it instead. The work runs
/// on the blocking thread pool.
///
/// # Examples
///
/// ```rust,no_run
/// use cutout_pipeline::{cutout_from_bytes, PipelineConfig, ProcessOptions};
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = PipelineConfig::default();
/// let result = cutout_from_bytes(&upload_bytes, &config, ProcessOptions::default()).await?;
/// let png = result.to_png()?;
/// # Ok(())
/// # }
/// ```
pub async fn cutout_from_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
    options: ProcessOptions,
) -> Result<CutoutResult> {
    let image = ImageIOService::decode(image_bytes)?;
    let session = Arc::new(SegmentationSession::from_config(&config.segmentation));
    let pipeline = Arc::new(CutoutPipeline::new(config.clone(), session)?);
    pipeline.process_async(image, options).await
}

/// Run the pipeline on an async reader stream
///
/// # Examples
///
/// ```rust,no_run
/// use cutout_pipeline::{cutout_from_reader, PipelineConfig, ProcessOptions};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("product.jpg").await?;
/// let result = cutout_from_reader(file, &PipelineConfig::default(), ProcessOptions::default()).await?;
/// std::fs::write("product_cutout.png", result.to_png()?)?;
/// # Ok(())
/// # }
/// ```
pub async fn cutout_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &PipelineConfig,
    options: ProcessOptions,
) -> Result<CutoutResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    cutout_from_bytes(&buffer, config, options).await
}
