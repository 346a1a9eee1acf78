//! Core value types shared by every pipeline stage

use crate::error::{CutoutError, Result, ShadowError};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully opaque alpha value
pub const OPAQUE: u8 = u8::MAX;

/// An owned RGBA8 raster with non-zero dimensions
///
/// The buffer length always equals `width * height * 4`; every constructor
/// checks this, so stages can index pixels without re-validating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    /// Create a raster from a raw RGBA8 buffer
    ///
    /// # Errors
    /// - Zero width or height
    /// - Buffer length different from `width * height * 4`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(CutoutError::invalid_dimensions(format!(
                "buffer of {} bytes does not match {width}x{height} RGBA ({expected} bytes)",
                data.len()
            )));
        }
        let pixels = ImageBuffer::from_raw(width, height, data).ok_or_else(|| {
            CutoutError::invalid_dimensions(format!("cannot build {width}x{height} raster"))
        })?;
        Self::from_rgba(pixels)
    }

    /// Wrap an existing RGBA buffer
    ///
    /// # Errors
    /// - Zero width or height
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(CutoutError::invalid_dimensions(format!(
                "raster must be non-empty, got {}x{}",
                pixels.width(),
                pixels.height()
            )));
        }
        Ok(Self { pixels })
    }

    /// Normalise any decoded image (RGB, grayscale, palette, 16-bit...) to RGBA8
    ///
    /// # Errors
    /// - Zero width or height
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::from_rgba(image.to_rgba8())
    }

    /// Create a raster filled with a single colour
    ///
    /// # Errors
    /// - Zero width or height
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        Self::from_rgba(ImageBuffer::from_pixel(width, height, Rgba(rgba)))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Pixel at `(x, y)`; panics when out of bounds like [`ImageBuffer::get_pixel`]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels.get_pixel(x, y).0
    }

    #[must_use]
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Mutable pixel iterator; the raster's dimensions cannot change through it
    pub fn pixels_mut(&mut self) -> image::buffer::PixelsMut<'_, Rgba<u8>> {
        self.pixels.pixels_mut()
    }

    #[must_use]
    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }

    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    #[must_use]
    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.pixels.clone())
    }

    /// Extract the alpha channel as a standalone mask
    #[must_use]
    pub fn alpha_mask(&self) -> AlphaMask {
        let (width, height) = self.dimensions();
        let data = self.pixels.pixels().map(|p| p[3]).collect();
        AlphaMask {
            pixels: GrayImage::from_raw(width, height, data)
                .unwrap_or_else(|| GrayImage::new(width, height)),
        }
    }

    /// Replace the alpha channel, leaving RGB untouched
    ///
    /// # Errors
    /// - Mask dimensions differ from the raster
    pub fn with_alpha(mut self, mask: &AlphaMask) -> Result<Self> {
        if mask.dimensions() != self.dimensions() {
            return Err(CutoutError::invalid_dimensions(format!(
                "alpha mask {}x{} does not match raster {}x{}",
                mask.width(),
                mask.height(),
                self.width(),
                self.height()
            )));
        }
        for (pixel, alpha) in self.pixels.pixels_mut().zip(mask.as_raw()) {
            pixel[3] = *alpha;
        }
        Ok(self)
    }

    /// Same pixels with every alpha forced to [`OPAQUE`]
    #[must_use]
    pub fn into_opaque(mut self) -> Self {
        for pixel in self.pixels.pixels_mut() {
            pixel[3] = OPAQUE;
        }
        self
    }

    /// `(min, max)` of the alpha channel
    #[must_use]
    pub fn alpha_extrema(&self) -> (u8, u8) {
        self.pixels
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[3]), hi.max(p[3])))
    }

    /// Per-channel `(min, max)` of R, G and B
    #[must_use]
    pub fn rgb_extrema(&self) -> [(u8, u8); 3] {
        let mut extrema = [(u8::MAX, u8::MIN); 3];
        for pixel in self.pixels.pixels() {
            for (range, &value) in extrema.iter_mut().zip(&pixel.0[..3]) {
                range.0 = range.0.min(value);
                range.1 = range.1.max(value);
            }
        }
        extrema
    }
}

/// Single-channel 8-bit mask; 0 = background, 255 = subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    pixels: GrayImage,
}

impl AlphaMask {
    /// # Errors
    /// - Buffer length different from `width * height`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        if len != (width as usize) * (height as usize) {
            return Err(CutoutError::invalid_dimensions(format!(
                "mask buffer of {len} bytes does not match {width}x{height}"
            )));
        }
        GrayImage::from_raw(width, height, data)
            .map(|pixels| Self { pixels })
            .ok_or_else(|| {
                CutoutError::invalid_dimensions(format!(
                    "mask buffer of {len} bytes does not match {width}x{height}"
                ))
            })
    }

    #[must_use]
    pub fn from_luma(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel(x, y).0[0]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        self.pixels.put_pixel(x, y, Luma([value]));
    }

    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    #[must_use]
    pub fn as_luma(&self) -> &GrayImage {
        &self.pixels
    }

    #[must_use]
    pub fn into_luma(self) -> GrayImage {
        self.pixels
    }

    /// `(min, max)` of the mask
    #[must_use]
    pub fn extrema(&self) -> (u8, u8) {
        self.pixels
            .as_raw()
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// Half-open pixel rectangle `[left, right) x [top, bottom)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// True when the box is narrower or shorter than a `width x height` canvas
    #[must_use]
    pub fn shrinks(&self, width: u32, height: u32) -> bool {
        self.width() < width || self.height() < height
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}) {}x{}",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// RGB colour without alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn from_rgba(pixel: [u8; 4]) -> Self {
        Self::new(pixel[0], pixel[1], pixel[2])
    }

    /// Squared Euclidean distance in RGB space
    ///
    /// Integer arithmetic keeps threshold comparisons exact across refiners.
    #[must_use]
    pub fn distance_squared(&self, r: u8, g: u8, b: u8) -> u32 {
        let dr = i32::from(self.r) - i32::from(r);
        let dg = i32::from(self.g) - i32::from(g);
        let db = i32::from(self.b) - i32::from(b);
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Drop-shadow parameters
///
/// Immutable once built. The blur radius is validated on construction; the
/// type supplies no defaults beyond the two named presets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawShadowSpec", into = "RawShadowSpec")]
pub struct ShadowSpec {
    offset: (i32, i32),
    blur: f32,
    opacity: u8,
}

impl ShadowSpec {
    /// # Errors
    /// - `blur` negative or not finite
    pub fn new(offset: (i32, i32), blur: f32, opacity: u8) -> std::result::Result<Self, ShadowError> {
        if !blur.is_finite() || blur < 0.0 {
            return Err(ShadowError::InvalidSpec(format!(
                "blur radius must be a non-negative finite number, got {blur}"
            )));
        }
        Ok(Self {
            offset,
            blur,
            opacity,
        })
    }

    /// Collage look: offset (6, 8), blur 10, caller-chosen intensity
    #[must_use]
    pub fn collage(opacity: u8) -> Self {
        Self {
            offset: (6, 8),
            blur: 10.0,
            opacity,
        }
    }

    /// Placeholder/error tiles: offset (4, 4), blur 8, opacity 50
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            offset: (4, 4),
            blur: 8.0,
            opacity: 50,
        }
    }

    #[must_use]
    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    #[must_use]
    pub fn blur(&self) -> f32 {
        self.blur
    }

    #[must_use]
    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    /// Whole-pixel spread reserved on each side for the blur
    #[must_use]
    pub fn margin(&self) -> u32 {
        self.blur.ceil() as u32
    }
}

#[derive(Serialize, Deserialize)]
struct RawShadowSpec {
    offset: (i32, i32),
    blur: f32,
    opacity: u8,
}

impl TryFrom<RawShadowSpec> for ShadowSpec {
    type Error = ShadowError;

    fn try_from(raw: RawShadowSpec) -> std::result::Result<Self, Self::Error> {
        Self::new(raw.offset, raw.blur, raw.opacity)
    }
}

impl From<ShadowSpec> for RawShadowSpec {
    fn from(spec: ShadowSpec) -> Self {
        Self {
            offset: spec.offset,
            blur: spec.blur,
            opacity: spec.opacity,
        }
    }
}

/// Per-stage wall-clock timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub segmentation_ms: u64,
    pub repair_ms: u64,
    pub crop_ms: u64,
    pub smoothing_ms: u64,
    pub shadow_ms: u64,
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
