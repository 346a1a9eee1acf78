//! Tight cropping to the visible subject

use crate::{
    config::Thresholds,
    types::{BoundingBox, RasterImage},
};
use image::imageops;
use tracing::{info, warn};

/// Result of the autocrop stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropOutcome {
    /// Canvas shrank; `aggressive` is set when the thresholded pass decided the final box
    Cropped {
        original: (u32, u32),
        bbox: BoundingBox,
        aggressive: bool,
    },
    /// Subject already fills the canvas
    Unchanged,
    /// No pixel has any opacity; image left uncropped
    Empty,
}

/// Smallest box containing every pixel with alpha strictly above `threshold`
#[must_use]
pub fn bounding_box(image: &RasterImage, threshold: u8) -> Option<BoundingBox> {
    let width = image.width() as usize;
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (index, pixel) in image.as_raw().chunks_exact(4).enumerate() {
        if pixel[3] <= threshold {
            continue;
        }
        let x = (index % width) as u32;
        let y = (index / width) as u32;
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((left, top, right, bottom)) => {
                (left.min(x), top.min(y), right.max(x), bottom.max(y))
            },
        });
    }

    bounds.map(|(left, top, right, bottom)| BoundingBox {
        left,
        top,
        right: right + 1,
        bottom: bottom + 1,
    })
}

fn crop_to(image: &RasterImage, bbox: BoundingBox) -> Option<RasterImage> {
    let cropped = imageops::crop_imm(
        image.as_rgba(),
        bbox.left,
        bbox.top,
        bbox.width(),
        bbox.height(),
    )
    .to_image();
    RasterImage::from_rgba(cropped).ok()
}

/// Crop `image` to its non-transparent region
///
/// First crops to the box of all pixels with alpha > 0, then to the box of
/// pixels above the aggressive threshold when that is smaller still. Soft
/// haloes that reach the border are removed by the second pass. The output is
/// a fixpoint: cropping it again changes nothing.
#[must_use]
pub fn autocrop(image: RasterImage, thresholds: &Thresholds) -> (RasterImage, CropOutcome) {
    let original = image.dimensions();

    let Some(bbox) = bounding_box(&image, 0) else {
        warn!(
            width = original.0,
            height = original.1,
            "No bounding box found, image is fully transparent"
        );
        return (image, CropOutcome::Empty);
    };

    let mut current = image;
    let mut final_box = None;

    if bbox.shrinks(current.width(), current.height()) {
        if let Some(cropped) = crop_to(&current, bbox) {
            current = cropped;
            final_box = Some((bbox, false));
        }
    }

    // Offsets of the aggressive box are relative to the current canvas
    let origin = final_box.map_or((0, 0), |(b, _)| (b.left, b.top));
    if let Some(tight) = bounding_box(&current, thresholds.aggressive_crop_alpha) {
        if tight.shrinks(current.width(), current.height()) {
            if let Some(cropped) = crop_to(&current, tight) {
                info!(
                    threshold = thresholds.aggressive_crop_alpha,
                    bbox = %tight,
                    "Aggressive crop applied"
                );
                current = cropped;
                final_box = Some((
                    BoundingBox {
                        left: origin.0 + tight.left,
                        top: origin.1 + tight.top,
                        right: origin.0 + tight.right,
                        bottom: origin.1 + tight.bottom,
                    },
                    true,
                ));
            }
        }
    }

    match final_box {
        Some((bbox, aggressive)) => {
            let saved = u64::from(original.0) * u64::from(original.1)
                - u64::from(current.width()) * u64::from(current.height());
            let total = u64::from(original.0) * u64::from(original.1);
            info!(
                from = ?original,
                to = ?current.dimensions(),
                pixels_saved = saved,
                percent_saved = %format!("{:.1}", saved as f64 * 100.0 / total as f64),
                "Cropped transparent margins"
            );
            (
                current,
                CropOutcome::Cropped {
                    original,
                    bbox,
                    aggressive,
                },
            )
        },
        None => {
            info!(width = original.0, height = original.1, "Subject fills canvas, no crop");
            (current, CropOutcome::Unchanged)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SmallRaster;
    use image::Rgba;
    use quickcheck_macros::quickcheck;

    fn canvas_with(width: u32, height: u32, pixels: &[(u32, u32, u8)]) -> RasterImage {
        let mut image = RasterImage::filled(width, height, [0, 0, 0, 0])
            .unwrap()
            .into_rgba();
        for &(x, y, alpha) in pixels {
            image.put_pixel(x, y, Rgba([50, 60, 70, alpha]));
        }
        RasterImage::from_rgba(image).unwrap()
    }

    #[test]
    fn test_bounding_box_half_open() {
        let image = canvas_with(10, 10, &[(2, 3, 255), (6, 7, 1)]);
        let bbox = bounding_box(&image, 0).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                left: 2,
                top: 3,
                right: 7,
                bottom: 8
            }
        );
        let strict = bounding_box(&image, 10).unwrap();
        assert_eq!(strict.width(), 1);
        assert!(bounding_box(&image, 255).is_none());
    }

    #[test]
    fn test_crops_to_subject() {
        let image = canvas_with(20, 10, &[(5, 2, 255), (9, 6, 255)]);
        let (out, outcome) = autocrop(image, &Thresholds::default());

        assert_eq!(out.dimensions(), (5, 5));
        assert_eq!(out.pixel(0, 0), [50, 60, 70, 255]);
        assert!(matches!(
            outcome,
            CropOutcome::Cropped {
                aggressive: false,
                ..
            }
        ));
    }

    #[test]
    fn test_aggressive_pass_trims_faint_halo() {
        // Faint halo touches every edge; only the centre is solid
        let mut image = RasterImage::filled(12, 12, [10, 10, 10, 5])
            .unwrap()
            .into_rgba();
        for y in 4..8 {
            for x in 3..9 {
                image.put_pixel(x, y, Rgba([200, 100, 50, 255]));
            }
        }
        let image = RasterImage::from_rgba(image).unwrap();

        let (out, outcome) = autocrop(image, &Thresholds::default());
        assert_eq!(out.dimensions(), (6, 4));
        match outcome {
            CropOutcome::Cropped {
                bbox, aggressive, ..
            } => {
                assert!(aggressive);
                assert_eq!((bbox.left, bbox.top), (3, 4));
            },
            other => panic!("expected crop, got {other:?}"),
        }
    }

    #[test]
    fn test_fully_transparent_left_uncropped() {
        let image = canvas_with(7, 5, &[]);
        let (out, outcome) = autocrop(image.clone(), &Thresholds::default());
        assert_eq!(outcome, CropOutcome::Empty);
        assert_eq!(out, image);
    }

    #[test]
    fn test_full_canvas_unchanged() {
        let image = RasterImage::filled(4, 4, [1, 1, 1, 255]).unwrap();
        let (out, outcome) = autocrop(image.clone(), &Thresholds::default());
        assert_eq!(outcome, CropOutcome::Unchanged);
        assert_eq!(out, image);
    }

    #[quickcheck]
    fn autocrop_is_idempotent(image: SmallRaster) {
        let thresholds = Thresholds::default();
        let (once, _) = autocrop(image.0, &thresholds);
        let (twice, outcome) = autocrop(once.clone(), &thresholds);
        assert_eq!(once, twice);
        assert!(!matches!(outcome, CropOutcome::Cropped { .. }));
    }
}
