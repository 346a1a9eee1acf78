//! Alpha mask refinement by colour distance
//!
//! Pixels whose RGB colour lies within `threshold` (Euclidean) of the
//! background colour are forced to alpha 0; every other pixel keeps its
//! alpha. Two interchangeable implementations exist: a bulk ndarray path and
//! a per-pixel scalar path. Both compare squared integer distances, so their
//! masks are bit-identical.

use crate::{
    config::RefineStrategy,
    error::{CutoutError, Result},
    types::{AlphaMask, Color, RasterImage},
};
use ndarray::{ArrayView2, ArrayView3, ArrayViewMut2, Axis, Zip};

/// Parameters of one refinement pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineParams {
    /// Colour treated as background
    pub background: Color,
    /// Pixels strictly closer than this are cleared
    pub threshold: u8,
    /// When set, only pixels whose current alpha exceeds this are cleared
    pub alpha_gate: Option<u8>,
}

impl RefineParams {
    /// Clear every pixel near `background`, whatever its alpha
    #[must_use]
    pub fn unconditional(background: Color, threshold: u8) -> Self {
        Self {
            background,
            threshold,
            alpha_gate: None,
        }
    }

    /// Clear only high-alpha pixels near `background`
    #[must_use]
    pub fn gated(background: Color, threshold: u8, gate: u8) -> Self {
        Self {
            background,
            threshold,
            alpha_gate: Some(gate),
        }
    }

    fn threshold_squared(&self) -> u32 {
        let t = u32::from(self.threshold);
        t * t
    }

    #[inline]
    fn clears(&self, distance_squared: u32, alpha: u8) -> bool {
        distance_squared < self.threshold_squared()
            && self.alpha_gate.map_or(true, |gate| alpha > gate)
    }
}

/// Rebuilds an alpha mask against a background colour
pub trait MaskRefiner: Send + Sync {
    /// Implementation name for logs
    fn name(&self) -> &'static str;

    /// Refine `base_alpha` for `image`
    ///
    /// The result never exceeds `base_alpha` at any pixel.
    ///
    /// # Errors
    /// - `base_alpha` dimensions differ from `image`
    fn refine_mask(
        &self,
        image: &RasterImage,
        base_alpha: &AlphaMask,
        params: &RefineParams,
    ) -> Result<AlphaMask>;
}

fn check_dimensions(image: &RasterImage, mask: &AlphaMask) -> Result<()> {
    if image.dimensions() == mask.dimensions() {
        Ok(())
    } else {
        Err(CutoutError::invalid_dimensions(format!(
            "mask {}x{} does not match image {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )))
    }
}

/// Bulk-array refiner built on ndarray
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorizedRefiner;

impl MaskRefiner for VectorizedRefiner {
    fn name(&self) -> &'static str {
        "vectorized"
    }

    fn refine_mask(
        &self,
        image: &RasterImage,
        base_alpha: &AlphaMask,
        params: &RefineParams,
    ) -> Result<AlphaMask> {
        check_dimensions(image, base_alpha)?;
        let (width, height) = image.dimensions();
        let shape = (height as usize, width as usize);

        let pixels = ArrayView3::from_shape((shape.0, shape.1, 4), image.as_raw())
            .map_err(|e| CutoutError::internal(format!("pixel view: {e}")))?;
        let base = ArrayView2::from_shape(shape, base_alpha.as_raw())
            .map_err(|e| CutoutError::internal(format!("alpha view: {e}")))?;

        let channel_delta = |index: usize, reference: u8| {
            pixels
                .index_axis(Axis(2), index)
                .mapv(|v| i32::from(v) - i32::from(reference))
        };
        let dr = channel_delta(0, params.background.r);
        let dg = channel_delta(1, params.background.g);
        let db = channel_delta(2, params.background.b);
        let distance_squared = (&dr * &dr + &dg * &dg + &db * &db).mapv(|d| d as u32);

        let mut refined = base_alpha.as_raw().to_vec();
        {
            let mut out = ArrayViewMut2::from_shape(shape, refined.as_mut_slice())
                .map_err(|e| CutoutError::internal(format!("output view: {e}")))?;
            Zip::from(&mut out)
                .and(&base)
                .and(&distance_squared)
                .for_each(|alpha, &current, &d2| {
                    if params.clears(d2, current) {
                        *alpha = 0;
                    }
                });
        }

        AlphaMask::new(width, height, refined)
    }
}

/// Pixel-by-pixel refiner with no array dependencies
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarRefiner;

impl MaskRefiner for ScalarRefiner {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn refine_mask(
        &self,
        image: &RasterImage,
        base_alpha: &AlphaMask,
        params: &RefineParams,
    ) -> Result<AlphaMask> {
        check_dimensions(image, base_alpha)?;
        let refined = image
            .as_raw()
            .chunks_exact(4)
            .zip(base_alpha.as_raw())
            .map(|(px, &alpha)| {
                let d2 = params.background.distance_squared(px[0], px[1], px[2]);
                if params.clears(d2, alpha) {
                    0
                } else {
                    alpha
                }
            })
            .collect();
        AlphaMask::new(image.width(), image.height(), refined)
    }
}

/// Refiner implementation for a configured strategy
#[must_use]
pub fn refiner_for(strategy: RefineStrategy) -> &'static dyn MaskRefiner {
    match strategy {
        RefineStrategy::Vectorized => &VectorizedRefiner,
        RefineStrategy::Scalar => &ScalarRefiner,
    }
}

/// Install `mask` as the alpha channel, clearing RGB where it is 0
///
/// Soft mask values are kept as they are.
///
/// # Errors
/// - Mask dimensions differ from `image`
pub fn apply_mask(mut image: RasterImage, mask: &AlphaMask) -> Result<RasterImage> {
    check_dimensions(&image, mask)?;
    for (pixel, &alpha) in image.pixels_mut().zip(mask.as_raw()) {
        pixel.0 = if alpha == 0 {
            [0, 0, 0, 0]
        } else {
            [pixel[0], pixel[1], pixel[2], alpha]
        };
    }
    Ok(image)
}
