//! Transparency validation
//!
//! Decides whether a segmentation output is a usable cutout, and whether a
//! solid black or white backdrop survived around an otherwise good cutout.

use crate::{
    background::border_positions,
    config::Thresholds,
    types::{Color, RasterImage, OPAQUE},
};
use std::fmt;
use tracing::debug;

/// Solid backdrop colour left behind by segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backdrop {
    Black,
    White,
}

impl Backdrop {
    /// Reference colour used for distance thresholding
    #[must_use]
    pub fn color(self) -> Color {
        match self {
            Backdrop::Black => Color::BLACK,
            Backdrop::White => Color::WHITE,
        }
    }
}

impl fmt::Display for Backdrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backdrop::Black => write!(f, "black"),
            Backdrop::White => write!(f, "white"),
        }
    }
}

/// True iff some pixel has alpha strictly below fully opaque
#[must_use]
pub fn has_transparency(image: &RasterImage) -> bool {
    image.alpha_extrema().0 < OPAQUE
}

/// Look for a near-black or near-white opaque backdrop at the border
///
/// Samples the four corners, plus the four edge midpoints when
/// `include_midpoints` is set. A sample counts when its alpha exceeds the
/// residual alpha gate and every channel is below `near_black` (black) or
/// above `near_white` (white). Any matching sample is enough; black wins when
/// both are present.
#[must_use]
pub fn detect_residual_backdrop(
    image: &RasterImage,
    thresholds: &Thresholds,
    include_midpoints: bool,
) -> Option<Backdrop> {
    let positions = border_positions(image.width(), image.height());
    let count = if include_midpoints { 8 } else { 4 };

    let (mut black, mut white) = (false, false);
    for &(x, y) in &positions[..count] {
        let [r, g, b, a] = image.pixel(x, y);
        if a <= thresholds.residual_alpha_gate {
            continue;
        }
        let channels = [r, g, b];
        black |= channels.iter().all(|&c| c < thresholds.near_black);
        white |= channels.iter().all(|&c| c > thresholds.near_white);
    }

    let backdrop = if black {
        Some(Backdrop::Black)
    } else if white {
        Some(Backdrop::White)
    } else {
        None
    };
    debug!(?backdrop, samples = count, "Residual backdrop check");
    backdrop
}
