//! Error types for cutout processing
//!
//! Only a handful of conditions are hard failures (undecodable input, bad
//! configuration, invalid raster dimensions). Stage-level conditions use the
//! closed enums [`SegmentationError`] and [`ShadowError`] and are recovered by
//! the pipeline.

use thiserror::Error;

/// Result type alias for cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or low-level image crate errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input bytes could not be decoded into a raster
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raster buffer does not match its declared dimensions
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Segmentation stage failure (normally recovered inside the pipeline)
    #[error("Segmentation error: {0}")]
    Segmentation(#[from] SegmentationError),

    /// Shadow stage failure (normally recovered inside the pipeline)
    #[error("Shadow error: {0}")]
    Shadow(#[from] ShadowError),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CutoutError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new invalid dimensions error
    pub fn invalid_dimensions<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDimensions(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range})"
        ))
    }
}

/// Failures of the external segmentation capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentationError {
    /// The capability is not configured or failed to initialise
    #[error("segmentation unavailable: {0}")]
    Unavailable(String),

    /// The capability ran but returned bytes that could not be decoded
    #[error("segmentation returned corrupt output: {0}")]
    Io(String),

    /// The backend itself reported a failure while running
    #[error("segmentation backend failed: {0}")]
    Backend(String),
}

impl SegmentationError {
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn io<S: Into<String>>(msg: S) -> Self {
        Self::Io(msg.into())
    }

    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }
}

/// Failures of the shadow compositor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShadowError {
    /// Blur radius is negative or not finite
    #[error("invalid shadow spec: {0}")]
    InvalidSpec(String),

    /// A layer did not fit the canvas it was pasted onto
    #[error(
        "layer {layer_width}x{layer_height} at ({x}, {y}) does not fit canvas {canvas_width}x{canvas_height}"
    )]
    DimensionMismatch {
        layer_width: u32,
        layer_height: u32,
        x: u32,
        y: u32,
        canvas_width: u32,
        canvas_height: u32,
    },
}
