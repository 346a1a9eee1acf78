//! Image I/O operations service
//!
//! Decoding normalises every supported input mode to RGBA8 before any stage
//! sees it; encoding always produces PNG so transparency survives.

use crate::{
    error::{CutoutError, Result},
    types::RasterImage,
};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Service for handling image encode/decode and file operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode PNG/JPEG bytes (RGB, RGBA, grayscale or palette) into RGBA
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    /// - Decoded image has zero width or height
    pub fn decode(bytes: &[u8]) -> Result<RasterImage> {
        let image = image::load_from_memory(bytes).map_err(|e| {
            CutoutError::decode(format!(
                "Failed to decode image from {} bytes: {e}",
                bytes.len()
            ))
        })?;
        debug!(
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "Decoded input image"
        );
        RasterImage::from_dynamic(&image)
    }

    /// Encode a raster as RGBA PNG
    ///
    /// # Errors
    /// - PNG encoder failure
    pub fn encode_png(image: &RasterImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        image
            .as_rgba()
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Encode the 3-channel form of a raster as PNG (alpha dropped)
    ///
    /// # Errors
    /// - PNG encoder failure
    pub fn encode_rgb_png(image: &RasterImage) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(image.as_rgba().clone()).to_rgb8();
        let mut buffer = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Load and normalise an image file
    ///
    /// # Errors
    /// - File cannot be read
    /// - Content is not a decodable image
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RasterImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| CutoutError::file_io_error("read image file", path_ref, &e))?;
        Self::decode(&data).map_err(|e| match e {
            CutoutError::Decode(msg) => {
                CutoutError::decode(format!("{}: {msg}", path_ref.display()))
            },
            other => other,
        })
    }

    /// Save a raster as PNG, creating parent directories as needed
    ///
    /// # Errors
    /// - Directory creation or write failure
    /// - PNG encoder failure
    pub fn save_png<P: AsRef<Path>>(image: &RasterImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CutoutError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }
        let bytes = Self::encode_png(image)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| CutoutError::file_io_error("write output file", path_ref, &e))?;
        Ok(())
    }
}
