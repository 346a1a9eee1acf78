//! Configuration types for the cutout pipeline

use crate::error::{CutoutError, Result};
use crate::types::ShadowSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which [`MaskRefiner`](crate::refine::MaskRefiner) implementation to run
///
/// Both produce bit-identical masks; the choice only affects speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefineStrategy {
    /// Bulk array operations over the whole raster
    #[default]
    Vectorized,
    /// Pixel-by-pixel loop
    Scalar,
}

impl std::fmt::Display for RefineStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vectorized => write!(f, "vectorized"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

/// Hand-tuned thresholds used by validation, inference, refinement and cropping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// RGB distance under which a pixel counts as inferred background
    pub background_distance: u8,
    /// RGB distance to pure black/white for the residual-backdrop pass
    pub residual_distance: u8,
    /// Alpha a pixel must exceed for the secondary crop pass
    pub aggressive_crop_alpha: u8,
    /// Sampled border pixels below this alpha are ignored by inference
    pub sample_min_alpha: u8,
    /// Alpha a pixel must exceed to count as opaque backdrop
    pub residual_alpha_gate: u8,
    /// Channels strictly below this are near-black
    pub near_black: u8,
    /// Channels strictly above this are near-white
    pub near_white: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            background_distance: 30,
            residual_distance: 20,
            aggressive_crop_alpha: 10,
            sample_min_alpha: 50,
            residual_alpha_gate: 200,
            near_black: 10,
            near_white: 245,
        }
    }
}

/// Settings for the bundled ONNX segmentation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Path to an ISNet-style ONNX model; `None` leaves segmentation unavailable
    pub model_path: Option<PathBuf>,
    /// Square model input resolution
    pub input_size: u32,
    /// Per-channel normalisation mean (0-1 range)
    pub normalization_mean: [f32; 3],
    /// Per-channel normalisation standard deviation
    pub normalization_std: [f32; 3],
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_size: 1024,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Configuration for a [`CutoutPipeline`](crate::pipeline::CutoutPipeline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Thresholds for every heuristic stage
    pub thresholds: Thresholds,

    /// Mask refiner implementation
    pub refine_strategy: RefineStrategy,

    /// Gaussian radius applied to the final alpha channel (below
    /// [`MIN_BLUR_SIGMA`](crate::smooth::MIN_BLUR_SIGMA) disables)
    pub edge_smoothing_radius: f32,

    /// Also sample edge midpoints when looking for a residual backdrop
    pub sample_edge_midpoints: bool,

    /// Drop shadow composited after smoothing
    pub shadow: Option<ShadowSpec>,

    /// Segmentation backend settings
    pub segmentation: SegmentationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            refine_strategy: RefineStrategy::default(),
            edge_smoothing_radius: 0.7,
            sample_edge_midpoints: false,
            shadow: None,
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use cutout_pipeline::{PipelineConfig, RefineStrategy, ShadowSpec};
    ///
    /// let config = PipelineConfig::builder()
    ///     .refine_strategy(RefineStrategy::Scalar)
    ///     .shadow(ShadowSpec::collage(70))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.shadow, Some(ShadowSpec::collage(70)));
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Negative or non-finite smoothing radius
    /// - Zero segmentation input size or zero normalisation std
    pub fn validate(&self) -> Result<()> {
        if !self.edge_smoothing_radius.is_finite() || self.edge_smoothing_radius < 0.0 {
            return Err(CutoutError::config_value_error(
                "edge_smoothing_radius",
                self.edge_smoothing_radius,
                ">= 0",
            ));
        }

        if self.segmentation.input_size == 0 {
            return Err(CutoutError::config_value_error(
                "segmentation.input_size",
                self.segmentation.input_size,
                ">= 1",
            ));
        }

        if self
            .segmentation
            .normalization_std
            .iter()
            .any(|s| !s.is_finite() || *s <= 0.0)
        {
            return Err(CutoutError::invalid_config(
                "segmentation.normalization_std values must be positive",
            ));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    /// - Malformed JSON or invalid shadow spec
    /// - Validation failures
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CutoutError::invalid_config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    /// - File cannot be read
    /// - Parse or validation failures
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CutoutError::file_io_error("read config file", path, &e))?;
        Self::from_json_str(&content)
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn refine_strategy(mut self, strategy: RefineStrategy) -> Self {
        self.config.refine_strategy = strategy;
        self
    }

    #[must_use]
    pub fn edge_smoothing_radius(mut self, radius: f32) -> Self {
        self.config.edge_smoothing_radius = radius;
        self
    }

    #[must_use]
    pub fn sample_edge_midpoints(mut self, enabled: bool) -> Self {
        self.config.sample_edge_midpoints = enabled;
        self
    }

    #[must_use]
    pub fn shadow(mut self, spec: ShadowSpec) -> Self {
        self.config.shadow = Some(spec);
        self
    }

    #[must_use]
    pub fn no_shadow(mut self) -> Self {
        self.config.shadow = None;
        self
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.segmentation.model_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn segmentation(mut self, segmentation: SegmentationConfig) -> Self {
        self.config.segmentation = segmentation;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - See [`PipelineConfig::validate`]
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
