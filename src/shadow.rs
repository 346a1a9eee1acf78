//! Drop-shadow compositing
//!
//! The subject's alpha is blurred into a silhouette, tinted black at the
//! requested opacity, placed at the shadow offset on an enlarged canvas, and
//! the untouched subject is composited on top.
//!
//! Canvas layout for a `w x h` subject, offset `(dx, dy)` and margin
//! `m = ceil(blur)`:
//!
//! - canvas: `(w + |dx| + 2m) x (h + |dy| + 2m)`
//! - shadow origin: `(m + max(0, dx), m + max(0, dy))`
//! - subject origin: `(m, m)`

use crate::{
    error::{Result, ShadowError},
    smooth::blur_mask,
    types::{RasterImage, ShadowSpec},
};
use image::{Rgba, RgbaImage};
use tracing::{debug, error, info};

/// Placeholder tile colour
pub const PLACEHOLDER_FILL: [u8; 4] = [240, 240, 240, 255];

/// Largest shadow canvas allocation, matching the image crate's default decode limit
const MAX_CANVAS_BYTES: u64 = 512 * 1024 * 1024;

/// What the shadow stage did
#[derive(Debug, Clone, PartialEq)]
pub enum ShadowOutcome {
    /// Shadow composited onto a canvas of the given size
    Applied { canvas: (u32, u32) },
    /// Not requested, or background removal was disabled
    Skipped,
    /// Compositing failed; the pre-shadow image was kept
    Failed(ShadowError),
}

/// Source-over composite of `layer` onto `canvas` at `(x, y)`
///
/// Fully opaque layer pixels are copied exactly and fully transparent ones
/// leave the canvas untouched.
///
/// # Errors
/// - [`ShadowError::DimensionMismatch`] when the layer does not fit
pub fn composite_over(
    canvas: &mut RgbaImage,
    layer: &RgbaImage,
    x: u32,
    y: u32,
) -> std::result::Result<(), ShadowError> {
    let (cw, ch) = canvas.dimensions();
    let (lw, lh) = layer.dimensions();
    let fits = x.checked_add(lw).is_some_and(|r| r <= cw)
        && y.checked_add(lh).is_some_and(|b| b <= ch);
    if !fits {
        return Err(ShadowError::DimensionMismatch {
            layer_width: lw,
            layer_height: lh,
            x,
            y,
            canvas_width: cw,
            canvas_height: ch,
        });
    }

    for (lx, ly, src) in layer.enumerate_pixels() {
        let dst = canvas.get_pixel_mut(x + lx, y + ly);
        *dst = blend_over(*src, *dst);
    }
    Ok(())
}

fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    match src[3] {
        255 => return src,
        0 => return dst,
        _ => {},
    }
    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (f32::from(src[c]) * sa + f32::from(dst[c]) * da * (1.0 - sa)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

fn canvas_size(width: u32, height: u32, spec: &ShadowSpec) -> std::result::Result<(u32, u32), ShadowError> {
    let (dx, dy) = spec.offset();
    let spread = spec.margin().checked_mul(2);
    let grow = |side: u32, offset: i32| {
        spread
            .and_then(|s| side.checked_add(offset.unsigned_abs())?.checked_add(s))
    };
    match (grow(width, dx), grow(height, dy)) {
        (Some(w), Some(h)) if u64::from(w) * u64::from(h) * 4 <= MAX_CANVAS_BYTES => Ok((w, h)),
        _ => Err(ShadowError::InvalidSpec(format!(
            "shadow canvas for {width}x{height} with offset ({dx}, {dy}) and blur {} is too large",
            spec.blur()
        ))),
    }
}

/// Render `image` over a drop shadow on an enlarged transparent canvas
///
/// # Errors
/// - [`ShadowError::InvalidSpec`] when the canvas would be too large
/// - [`ShadowError::DimensionMismatch`] when a layer does not fit its canvas
pub fn add_shadow(
    image: &RasterImage,
    spec: &ShadowSpec,
) -> std::result::Result<RasterImage, ShadowError> {
    let (width, height) = image.dimensions();
    let (canvas_w, canvas_h) = canvas_size(width, height, spec)?;
    let margin = spec.margin();
    let (dx, dy) = spec.offset();

    info!(
        width,
        height,
        offset = ?spec.offset(),
        blur = spec.blur(),
        opacity = spec.opacity(),
        "Adding drop shadow"
    );

    let silhouette = image.alpha_mask().into_luma();
    let silhouette = blur_mask(&silhouette, spec.blur()).unwrap_or(silhouette);

    let opacity = u32::from(spec.opacity());
    let mut tint = RgbaImage::new(width, height);
    for (pixel, mask) in tint.pixels_mut().zip(silhouette.pixels()) {
        let alpha = (opacity * u32::from(mask[0]) + 127) / 255;
        *pixel = Rgba([0, 0, 0, alpha as u8]);
    }

    let shadow_x = margin + dx.max(0).unsigned_abs();
    let shadow_y = margin + dy.max(0).unsigned_abs();

    let mut canvas = RgbaImage::new(canvas_w, canvas_h);
    composite_over(&mut canvas, &tint, shadow_x, shadow_y)?;
    composite_over(&mut canvas, image.as_rgba(), margin, margin)?;

    let shadowed = RasterImage::from_rgba(canvas).map_err(|_| ShadowError::DimensionMismatch {
        layer_width: width,
        layer_height: height,
        x: margin,
        y: margin,
        canvas_width: canvas_w,
        canvas_height: canvas_h,
    })?;
    debug!(
        canvas_width = canvas_w,
        canvas_height = canvas_h,
        shadow_x,
        shadow_y,
        alpha_extrema = ?shadowed.alpha_extrema(),
        "Shadow composited"
    );
    Ok(shadowed)
}

/// Add a shadow, keeping the input unchanged if compositing fails
#[must_use]
pub fn apply_shadow(image: RasterImage, spec: &ShadowSpec) -> (RasterImage, ShadowOutcome) {
    match add_shadow(&image, spec) {
        Ok(shadowed) => {
            let canvas = shadowed.dimensions();
            (shadowed, ShadowOutcome::Applied { canvas })
        },
        Err(e) => {
            error!(
                width = image.width(),
                height = image.height(),
                offset = ?spec.offset(),
                blur = spec.blur(),
                "Shadow composition failed, keeping image without shadow: {e}"
            );
            (image, ShadowOutcome::Failed(e))
        },
    }
}

/// Light grey tile with the placeholder shadow, for missing images
///
/// # Errors
/// - Zero width or height
pub fn create_placeholder(width: u32, height: u32) -> Result<RasterImage> {
    let tile = RasterImage::filled(width, height, PLACEHOLDER_FILL)?;
    let (placeholder, _) = apply_shadow(tile, &ShadowSpec::placeholder());
    Ok(placeholder)
}
