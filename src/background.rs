//! Background colour inference from border samples

use crate::{
    config::Thresholds,
    types::{AlphaMask, Color, RasterImage},
};
use tracing::debug;

/// The eight border sample positions: corners first, then edge midpoints
///
/// Order is top-left, top-right, bottom-left, bottom-right, top-middle,
/// bottom-middle, left-middle, right-middle. Positions repeat on images
/// narrower or shorter than three pixels.
#[must_use]
pub fn border_positions(width: u32, height: u32) -> [(u32, u32); 8] {
    let (right, bottom) = (width.saturating_sub(1), height.saturating_sub(1));
    let (mid_x, mid_y) = (width / 2, height / 2);
    [
        (0, 0),
        (right, 0),
        (0, bottom),
        (right, bottom),
        (mid_x, 0),
        (mid_x, bottom),
        (0, mid_y),
        (right, mid_y),
    ]
}

/// Estimate the implicit background colour of `image`
///
/// Samples are skipped where `alpha` is below the sampling threshold. The
/// most frequent remaining colour wins; ties go to the colour seen first.
/// Returns `None` when every sample was skipped.
#[must_use]
pub fn infer_background(
    image: &RasterImage,
    alpha: &AlphaMask,
    thresholds: &Thresholds,
) -> Option<Color> {
    let mut counts: Vec<(Color, usize)> = Vec::with_capacity(8);

    for (x, y) in border_positions(image.width(), image.height()) {
        if alpha.get(x, y) < thresholds.sample_min_alpha {
            continue;
        }
        let color = Color::from_rgba(image.pixel(x, y));
        match counts.iter_mut().find(|(c, _)| *c == color) {
            Some((_, n)) => *n += 1,
            None => counts.push((color, 1)),
        }
    }

    // max_by_key keeps the last maximum, so fold to keep the first
    let best = counts
        .iter()
        .fold(None::<&(Color, usize)>, |best, entry| match best {
            Some(b) if b.1 >= entry.1 => Some(b),
            _ => Some(entry),
        })
        .map(|(color, _)| *color);

    debug!(candidates = counts.len(), background = ?best, "Background inference");
    best
}
