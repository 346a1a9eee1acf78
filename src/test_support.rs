//! Helpers for using `quickcheck`'s `Arbitrary` trait with rasters

use crate::types::{Color, RasterImage};
use quickcheck::{Arbitrary, Gen};

/// A small random RGBA raster
///
/// Channel values lean towards the extremes so thresholds near black, white
/// and full opacity get exercised, not only the middle of the range.
#[derive(Debug, Clone)]
pub struct SmallRaster(pub RasterImage);

fn channel(g: &mut Gen) -> u8 {
    *g.choose(&[0u8, 3, 9, 10, 11, 120, 200, 201, 245, 246, 252, 255])
        .unwrap_or(&0)
}

fn any_byte(g: &mut Gen) -> u8 {
    if bool::arbitrary(g) {
        channel(g)
    } else {
        u8::arbitrary(g)
    }
}

impl Arbitrary for SmallRaster {
    fn arbitrary(g: &mut Gen) -> Self {
        let width = u32::from(u8::arbitrary(g) % 24) + 1;
        let height = u32::from(u8::arbitrary(g) % 24) + 1;
        let data = (0..width * height * 4).map(|_| any_byte(g)).collect();
        Self(RasterImage::new(width, height, data).unwrap())
    }
}

/// A colour drawn from the same extreme-leaning distribution
#[must_use]
pub fn arbitrary_color(g: &mut Gen) -> Color {
    Color::new(any_byte(g), any_byte(g), any_byte(g))
}

#[derive(Debug, Clone)]
pub struct AnyColor(pub Color);

impl Arbitrary for AnyColor {
    fn arbitrary(g: &mut Gen) -> Self {
        Self(arbitrary_color(g))
    }
}
