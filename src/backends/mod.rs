//! Segmentation backend implementations
//!
//! - Tract backend (pure Rust ONNX inference, `tract` feature)
//! - Mock backend for tests (`test-utils` feature outside this crate)

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(any(test, feature = "test-utils"))]
pub use self::mock::{MockSegmenter, MockSegmenterFactory};

#[cfg(feature = "tract")]
pub use self::tract::{TractSegmenter, TractSegmenterFactory};
