use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cutout_pipeline::{
    add_shadow, autocrop, smooth_edges, Color, MaskRefiner, RasterImage, RefineParams,
    ScalarRefiner, ShadowSpec, Thresholds, VectorizedRefiner,
};
use image::{Rgba, RgbaImage};

/// Product shot: white background with a noisy subject in the middle
fn product_image(size: u32) -> RasterImage {
    let mut pixels = RgbaImage::from_pixel(size, size, Rgba([255, 255, 255, 255]));
    for y in size / 4..size * 3 / 4 {
        for x in size / 5..size * 4 / 5 {
            let shade = ((x * 7 + y * 13) % 64) as u8;
            pixels.put_pixel(x, y, Rgba([60 + shade, 90, 180 - shade, 255]));
        }
    }
    RasterImage::from_rgba(pixels).unwrap_or_else(|e| panic!("bench image: {e}"))
}

fn bench_refiners(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine_mask");
    let params = RefineParams::unconditional(Color::WHITE, 30);
    let refiners: [&dyn MaskRefiner; 2] = [&VectorizedRefiner, &ScalarRefiner];

    for size in [256u32, 1024] {
        let image = product_image(size);
        let base = image.alpha_mask();
        for refiner in refiners {
            group.bench_with_input(BenchmarkId::new(refiner.name(), size), &size, |b, _| {
                b.iter(|| {
                    refiner
                        .refine_mask(black_box(&image), black_box(&base), &params)
                        .unwrap_or_else(|e| panic!("refine: {e}"))
                });
            });
        }
    }
    group.finish();
}

fn bench_post_stages(c: &mut Criterion) {
    let image = product_image(512);
    let thresholds = Thresholds::default();

    c.bench_function("autocrop_512", |b| {
        b.iter(|| autocrop(black_box(image.clone()), &thresholds));
    });
    c.bench_function("smooth_edges_512", |b| {
        b.iter(|| smooth_edges(black_box(image.clone()), 0.7));
    });
    c.bench_function("collage_shadow_512", |b| {
        let spec = ShadowSpec::collage(70);
        b.iter(|| add_shadow(black_box(&image), &spec));
    });
}

criterion_group!(benches, bench_refiners, bench_post_stages);
criterion_main!(benches);
