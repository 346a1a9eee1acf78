//! Mock segmenters for testing the pipeline without model files
//!
//! The mocks speak the same byte protocol as a real backend (PNG RGB in,
//! PNG RGBA out) and record every call so tests can check how the pipeline
//! used them.

use crate::{
    error::SegmentationError,
    segmentation::{Segmenter, SegmenterFactory},
    services::ImageIOService,
    types::{AlphaMask, RasterImage},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum MockBehavior {
    /// Echo the input as an opaque RGBA image (no transparency produced)
    PassThrough,
    /// Opaque disc in the middle, transparent outside, soft rim
    CircularMask,
    /// Apply a caller-provided alpha mask
    FixedMask(AlphaMask),
    /// Return bytes that are not an image
    Corrupt,
    /// Report a backend failure
    FailInference,
    /// Report that the capability cannot run
    Unavailable,
}

/// Mock segmentation backend
#[derive(Debug, Clone)]
pub struct MockSegmenter {
    behavior: MockBehavior,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockSegmenter {
    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the input unchanged, fully opaque
    #[must_use]
    pub fn pass_through() -> Self {
        Self::with_behavior(MockBehavior::PassThrough)
    }

    /// Keeps a centred disc of radius `min(w, h) / 3`
    #[must_use]
    pub fn circular() -> Self {
        Self::with_behavior(MockBehavior::CircularMask)
    }

    /// Applies `mask` as the output alpha; input dimensions must match
    #[must_use]
    pub fn with_mask(mask: AlphaMask) -> Self {
        Self::with_behavior(MockBehavior::FixedMask(mask))
    }

    /// Returns undecodable bytes
    #[must_use]
    pub fn corrupt() -> Self {
        Self::with_behavior(MockBehavior::Corrupt)
    }

    /// Fails every call with a backend error
    #[must_use]
    pub fn failing() -> Self {
        Self::with_behavior(MockBehavior::FailInference)
    }

    /// Fails every call as unavailable
    #[must_use]
    pub fn unavailable() -> Self {
        Self::with_behavior(MockBehavior::Unavailable)
    }

    /// Get the call history for verification in tests
    pub fn call_history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Shared handle to the call history, usable after the mock is boxed
    #[must_use]
    pub fn call_history_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }

    fn circular_mask(width: u32, height: u32) -> AlphaMask {
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = width.min(height) as f32 / 3.0;
        let feather = 2.0_f32;

        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let dx = x as f32 + 0.5 - center_x;
                let dy = y as f32 + 0.5 - center_y;
                let distance = (dx * dx + dy * dy).sqrt();
                let value = ((radius - distance) / feather).clamp(0.0, 1.0);
                (value * 255.0).round() as u8
            })
            .collect();

        AlphaMask::from_luma(
            image::GrayImage::from_raw(width, height, data)
                .unwrap_or_else(|| image::GrayImage::new(width, height)),
        )
    }

    fn cutout(input: RasterImage, mask: &AlphaMask) -> Result<Vec<u8>, SegmentationError> {
        let cutout = input
            .with_alpha(mask)
            .map_err(|e| SegmentationError::backend(e.to_string()))?;
        ImageIOService::encode_png(&cutout).map_err(|e| SegmentationError::backend(e.to_string()))
    }
}

impl Default for MockSegmenter {
    fn default() -> Self {
        Self::circular()
    }
}

impl Segmenter for MockSegmenter {
    fn name(&self) -> &str {
        "mock"
    }

    fn remove_background(&self, png_rgb: &[u8]) -> Result<Vec<u8>, SegmentationError> {
        let decoded = image::load_from_memory(png_rgb);
        match &decoded {
            Ok(image) => self.record_call(format!("remove_background:{:?}", image.color())),
            Err(_) => self.record_call("remove_background:undecodable".to_string()),
        }

        match &self.behavior {
            MockBehavior::Corrupt => return Ok(b"\x89PNG\r\n\x1a\nnot really".to_vec()),
            MockBehavior::FailInference => {
                return Err(SegmentationError::backend("mock inference failed"))
            },
            MockBehavior::Unavailable => {
                return Err(SegmentationError::unavailable("mock backend disabled"))
            },
            _ => {},
        }

        let input = decoded
            .map_err(|e| SegmentationError::backend(format!("mock could not decode input: {e}")))
            .and_then(|image| {
                RasterImage::from_dynamic(&image)
                    .map_err(|e| SegmentationError::backend(e.to_string()))
            })?;

        match &self.behavior {
            MockBehavior::CircularMask => {
                let mask = Self::circular_mask(input.width(), input.height());
                Self::cutout(input, &mask)
            },
            MockBehavior::FixedMask(mask) => Self::cutout(input, mask),
            _ => ImageIOService::encode_png(&input)
                .map_err(|e| SegmentationError::backend(e.to_string())),
        }
    }
}

/// Factory producing clones of a template [`MockSegmenter`]
#[derive(Debug)]
pub struct MockSegmenterFactory {
    template: MockSegmenter,
    should_fail_init: bool,
    created: Arc<AtomicUsize>,
}

impl MockSegmenterFactory {
    #[must_use]
    pub fn new(template: MockSegmenter) -> Self {
        Self {
            template,
            should_fail_init: false,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Factory whose initialisation always fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            should_fail_init: true,
            ..Self::new(MockSegmenter::pass_through())
        }
    }

    /// Counter of `create` calls, shared with the factory
    #[must_use]
    pub fn creation_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl SegmenterFactory for MockSegmenterFactory {
    fn create(&self) -> Result<Box<dyn Segmenter>, SegmentationError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_init {
            return Err(SegmentationError::unavailable(
                "mock segmenter initialization failed",
            ));
        }
        Ok(Box::new(self.template.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_png(width: u32, height: u32) -> Vec<u8> {
        let raster = RasterImage::filled(width, height, [40, 80, 120, 255]).unwrap();
        ImageIOService::encode_rgb_png(&raster).unwrap()
    }

    #[test]
    fn test_circular_mask_keeps_center() {
        let mock = MockSegmenter::circular();
        let out = mock.remove_background(&rgb_png(30, 30)).unwrap();
        let cutout = ImageIOService::decode(&out).unwrap();

        assert_eq!(cutout.pixel(15, 15)[3], 255);
        assert_eq!(cutout.pixel(0, 0)[3], 0);
        assert_eq!(cutout.pixel(15, 15)[..3], [40, 80, 120]);
    }

    #[test]
    fn test_fixed_mask_dimension_mismatch_is_backend_error() {
        let mask = AlphaMask::new(2, 2, vec![255; 4]).unwrap();
        let mock = MockSegmenter::with_mask(mask);
        let err = mock.remove_background(&rgb_png(3, 3)).unwrap_err();
        assert!(matches!(err, SegmentationError::Backend(_)));
    }

    #[test]
    fn test_call_history_records_calls() {
        let mock = MockSegmenter::corrupt();
        let _ = mock.remove_background(&rgb_png(2, 2));
        let _ = mock.remove_background(b"junk");
        assert_eq!(
            mock.call_history(),
            vec![
                "remove_background:Rgb8".to_string(),
                "remove_background:undecodable".to_string()
            ]
        );
    }

    #[test]
    fn test_factory_failure() {
        let factory = MockSegmenterFactory::failing();
        assert!(matches!(
            factory.create(),
            Err(SegmentationError::Unavailable(_))
        ));
        assert_eq!(factory.creation_counter().load(Ordering::SeqCst), 1);
    }
}
