//! Edge smoothing on the alpha channel

use crate::types::RasterImage;
use image::{imageops, GrayImage};
use tracing::debug;

/// Smallest sigma that is actually blurred
///
/// `imageops::blur` degenerates below this and shifts the mask one pixel to
/// the right instead of softening it.
pub const MIN_BLUR_SIGMA: f32 = 0.1;

/// Gaussian blur of a single-channel mask, or `None` when `sigma` is too small
pub(crate) fn blur_mask(mask: &GrayImage, sigma: f32) -> Option<GrayImage> {
    (sigma >= MIN_BLUR_SIGMA).then(|| imageops::blur(mask, sigma))
}

/// Gaussian-blur the alpha channel with standard deviation `radius`
///
/// RGB is untouched. Radii below [`MIN_BLUR_SIGMA`] (including zero and NaN)
/// return the image as is. Run this after cropping so the blur cannot bleed
/// across the final border.
#[must_use]
pub fn smooth_edges(mut image: RasterImage, radius: f32) -> RasterImage {
    let alpha = image.alpha_mask().into_luma();
    let Some(blurred) = blur_mask(&alpha, radius) else {
        return image;
    };

    for (pixel, value) in image.pixels_mut().zip(blurred.pixels()) {
        pixel[3] = value[0];
    }
    debug!(radius, "Smoothed alpha edges");
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn hard_edge() -> RasterImage {
        let mut pixels = RasterImage::filled(20, 20, [10, 20, 30, 0]).unwrap().into_rgba();
        for y in 0..20 {
            for x in 10..20 {
                pixels.put_pixel(x, y, Rgba([200, 150, 100, 255]));
            }
        }
        RasterImage::from_rgba(pixels).unwrap()
    }

    #[test]
    fn test_softens_alpha_edge() {
        let out = smooth_edges(hard_edge(), 0.7);
        let inside = out.pixel(10, 10)[3];
        let outside = out.pixel(9, 10)[3];
        assert!(inside < 255 && inside > 0);
        assert!(outside > 0 && outside < 255);
        assert_eq!(out.pixel(2, 10)[3], 0);
        assert_eq!(out.pixel(17, 10)[3], 255);
    }

    #[test]
    fn test_rgb_untouched() {
        let input = hard_edge();
        let out = smooth_edges(input.clone(), 0.7);
        for (a, b) in input.as_raw().chunks_exact(4).zip(out.as_raw().chunks_exact(4)) {
            assert_eq!(a[..3], b[..3]);
        }
    }

    #[test]
    fn test_zero_radius_is_noop() {
        let input = hard_edge();
        assert_eq!(smooth_edges(input.clone(), 0.0), input);
        assert_eq!(smooth_edges(input.clone(), f32::NAN), input);
    }

    fn centered_square() -> RasterImage {
        let mut pixels = RasterImage::filled(20, 20, [0, 0, 0, 0]).unwrap().into_rgba();
        for y in 5..15 {
            for x in 5..15 {
                pixels.put_pixel(x, y, Rgba([90, 90, 90, 255]));
            }
        }
        RasterImage::from_rgba(pixels).unwrap()
    }

    /// Alpha-weighted centre of mass, x then y
    fn alpha_centroid(image: &RasterImage) -> (f64, f64) {
        let (mut total, mut sx, mut sy) = (0.0, 0.0, 0.0);
        for y in 0..image.height() {
            for x in 0..image.width() {
                let a = f64::from(image.pixel(x, y)[3]);
                total += a;
                sx += a * f64::from(x);
                sy += a * f64::from(y);
            }
        }
        (sx / total, sy / total)
    }

    #[test]
    fn test_tiny_radius_does_not_shift_mask() {
        let input = centered_square();
        let (cx, cy) = alpha_centroid(&input);
        for radius in [0.01, 0.05, MIN_BLUR_SIGMA, 0.2, 0.7] {
            let out = smooth_edges(input.clone(), radius);
            let (ox, oy) = alpha_centroid(&out);
            assert!((ox - cx).abs() < 0.25, "radius {radius}: x {ox} vs {cx}");
            assert!((oy - cy).abs() < 0.25, "radius {radius}: y {oy} vs {cy}");
            // left edge column keeps its opacity, the column past the right edge stays clear
            assert!(out.pixel(5, 10)[3] > 0, "radius {radius}");
            assert!(out.pixel(15, 10)[3] < 255, "radius {radius}");
        }
        assert_eq!(smooth_edges(input.clone(), 0.05), input);
    }
}
