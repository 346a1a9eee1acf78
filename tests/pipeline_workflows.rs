//! Integration tests for complete cutout workflows
//!
//! These tests verify end-to-end behaviour without a real model, using mock
//! segmenters to simulate good, opaque, corrupt and missing backends.

use cutout_pipeline::{
    autocrop, services::RecordingProgressReporter, smooth_edges, AlphaMask, Color, CutoutError,
    CutoutPipeline, ImageIOService, MockSegmenter, MockSegmenterFactory, PipelineConfig,
    ProcessOptions, ProcessingStage, RasterImage, RefineStrategy, RepairOutcome,
    SegmentationOutcome, SegmentationSession, ShadowOutcome, ShadowSpec, Thresholds,
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

const SUBJECT: [u8; 4] = [200, 40, 40, 255];
const SUBJECT_LEFT: u32 = 120;
const SUBJECT_TOP: u32 = 80;
const SUBJECT_RIGHT: u32 = 380;
const SUBJECT_BOTTOM: u32 = 420;

/// 500x500 white product shot with a red rectangle subject
fn product_on_white() -> RasterImage {
    let mut pixels = RgbaImage::from_pixel(500, 500, Rgba([255, 255, 255, 255]));
    for y in SUBJECT_TOP..SUBJECT_BOTTOM {
        for x in SUBJECT_LEFT..SUBJECT_RIGHT {
            pixels.put_pixel(x, y, Rgba(SUBJECT));
        }
    }
    RasterImage::from_rgba(pixels).unwrap()
}

/// Mask a well-behaved segmenter would return for [`product_on_white`]
fn subject_mask() -> AlphaMask {
    let mut mask = AlphaMask::new(500, 500, vec![0; 500 * 500]).unwrap();
    for y in SUBJECT_TOP..SUBJECT_BOTTOM {
        for x in SUBJECT_LEFT..SUBJECT_RIGHT {
            mask.set(x, y, 255);
        }
    }
    mask
}

fn pipeline_with(segmenter: MockSegmenter, config: PipelineConfig) -> CutoutPipeline {
    let session = Arc::new(SegmentationSession::with_segmenter(Box::new(segmenter)));
    CutoutPipeline::new(config, session).unwrap()
}

fn no_shadow() -> ProcessOptions {
    ProcessOptions {
        add_shadow: false,
        ..ProcessOptions::default()
    }
}

#[test]
fn test_opaque_segmentation_is_repaired_and_cropped() {
    let pipeline = pipeline_with(MockSegmenter::pass_through(), PipelineConfig::default());
    let result = pipeline.process(product_on_white()).unwrap();

    assert_eq!(result.image.dimensions(), (260, 340));
    assert_eq!(
        result.report.repair,
        RepairOutcome::Refined {
            background: Color::WHITE,
            threshold: 30,
            residual: None,
            refiner: "vectorized",
        }
    );
    assert_eq!(result.report.original_dimensions, (500, 500));
    assert_eq!(result.report.final_dimensions, (260, 340));
    assert_eq!(result.report.shadow, ShadowOutcome::Skipped);

    let [r, g, b, a] = result.image.pixel(130, 170);
    assert_eq!([r, g, b], [200, 40, 40]);
    assert!(a >= 250, "interior alpha {a}");
}

#[test]
fn test_scalar_strategy_gives_same_result() {
    let config = PipelineConfig::builder()
        .refine_strategy(RefineStrategy::Scalar)
        .build()
        .unwrap();
    let scalar = pipeline_with(MockSegmenter::pass_through(), config)
        .process(product_on_white())
        .unwrap();
    let vectorized = pipeline_with(MockSegmenter::pass_through(), PipelineConfig::default())
        .process(product_on_white())
        .unwrap();

    assert_eq!(scalar.image, vectorized.image);
    assert!(matches!(
        scalar.report.repair,
        RepairOutcome::Refined { refiner: "scalar", .. }
    ));
}

#[test]
fn test_good_cutout_skips_refinement() {
    let pipeline = pipeline_with(MockSegmenter::with_mask(subject_mask()), PipelineConfig::default());
    let result = pipeline.process(product_on_white()).unwrap();

    assert_eq!(result.report.repair, RepairOutcome::NotNeeded);
    assert!(matches!(
        result.report.segmentation,
        Some(SegmentationOutcome::Segmented { .. })
    ));
    assert_eq!(result.image.dimensions(), (260, 340));
}

#[test]
fn test_unavailable_segmentation_falls_back_to_inference() {
    let pipeline =
        CutoutPipeline::new(PipelineConfig::default(), Arc::new(SegmentationSession::unavailable()))
            .unwrap();
    let result = pipeline.process(product_on_white()).unwrap();

    assert!(matches!(
        result.report.segmentation,
        Some(SegmentationOutcome::Unavailable(_))
    ));
    assert!(matches!(
        result.report.repair,
        RepairOutcome::Refined {
            background: Color::WHITE,
            ..
        }
    ));
    assert_eq!(result.image.dimensions(), (260, 340));
}

#[test]
fn test_corrupt_segmentation_passes_original_through() {
    let reporter = Arc::new(RecordingProgressReporter::new());
    let pipeline = pipeline_with(MockSegmenter::corrupt(), PipelineConfig::default())
        .with_reporter(reporter.clone());
    let input = product_on_white();
    let result = pipeline.process_with(input.clone(), &ProcessOptions::default()).unwrap();

    assert_eq!(result.image, input);
    assert!(matches!(
        result.report.segmentation,
        Some(SegmentationOutcome::Failed(_))
    ));
    assert_eq!(result.report.shadow, ShadowOutcome::Skipped);

    let errors = reporter.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ProcessingStage::Segmentation);
}

#[test]
fn test_collage_shadow_enlarges_canvas() {
    let pipeline = pipeline_with(MockSegmenter::pass_through(), PipelineConfig::default());
    let result = pipeline
        .process_with(product_on_white(), &ProcessOptions::default())
        .unwrap();

    // Same growth as the collage preset applied to the cropped subject alone
    let cropped = RasterImage::filled(260, 340, SUBJECT).unwrap();
    let expected = cutout_pipeline::add_shadow(&cropped, &ShadowSpec::collage(70))
        .unwrap()
        .dimensions();

    assert_eq!(result.image.dimensions(), expected);
    assert_eq!(result.report.shadow, ShadowOutcome::Applied { canvas: expected });
    assert!(expected.0 > 260 && expected.1 > 340);
}

#[test]
fn test_configured_shadow_used_by_process() {
    let config = PipelineConfig::builder()
        .shadow(ShadowSpec::new((3, 3), 0.0, 100).unwrap())
        .build()
        .unwrap();
    let result = pipeline_with(MockSegmenter::pass_through(), config)
        .process(product_on_white())
        .unwrap();

    assert_eq!(result.image.dimensions(), (263, 343));
}

#[test]
fn test_crop_happens_before_smoothing() {
    // Subject with a soft two-pixel halo, as a real segmenter would return
    let mut mask = subject_mask();
    for y in SUBJECT_TOP - 2..SUBJECT_BOTTOM + 2 {
        for x in SUBJECT_LEFT - 2..SUBJECT_RIGHT + 2 {
            if mask.get(x, y) == 0 {
                mask.set(x, y, 60);
            }
        }
    }
    let segmented = product_on_white().with_alpha(&mask).unwrap();
    let thresholds = Thresholds::default();
    let radius = 3.0;

    let crop_then_smooth = smooth_edges(autocrop(segmented.clone(), &thresholds).0, radius);
    let smooth_then_crop = autocrop(smooth_edges(segmented, radius), &thresholds).0;
    assert_ne!(crop_then_smooth.dimensions(), smooth_then_crop.dimensions());

    let config = PipelineConfig::builder()
        .edge_smoothing_radius(radius)
        .build()
        .unwrap();
    let result = pipeline_with(MockSegmenter::with_mask(mask), config)
        .process(product_on_white())
        .unwrap();

    assert_eq!(result.report.repair, RepairOutcome::NotNeeded);
    assert_eq!(result.image, crop_then_smooth);
}

#[test]
fn test_shared_session_initialises_once() {
    let factory = MockSegmenterFactory::new(MockSegmenter::pass_through());
    let counter = factory.creation_counter();
    let session = Arc::new(SegmentationSession::new(Box::new(factory)));

    let first = CutoutPipeline::new(PipelineConfig::default(), Arc::clone(&session)).unwrap();
    let second = CutoutPipeline::new(PipelineConfig::default(), Arc::clone(&session)).unwrap();
    assert!(!session.is_initialized());

    first.process_with(product_on_white(), &no_shadow()).unwrap();
    second.process_with(product_on_white(), &no_shadow()).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(session.is_initialized());
}

#[test]
fn test_process_bytes_rejects_garbage() {
    let pipeline = pipeline_with(MockSegmenter::pass_through(), PipelineConfig::default());
    let err = pipeline.process_bytes(b"definitely not a png").unwrap_err();
    assert!(matches!(err, CutoutError::Decode(_)));
}

#[test]
fn test_save_and_reload_result() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cutout.png");

    let pipeline = pipeline_with(MockSegmenter::pass_through(), PipelineConfig::default());
    let png = ImageIOService::encode_png(&product_on_white()).unwrap();
    let result = pipeline.process_bytes(&png).unwrap();
    ImageIOService::save_png(&result.image, &path).unwrap();

    let reloaded = ImageIOService::load(&path).unwrap();
    assert_eq!(reloaded, result.image);
    assert_eq!(result.to_png().unwrap(), std::fs::read(&path).unwrap());
}

#[tokio::test]
async fn test_process_async_concurrent_calls() {
    let pipeline = Arc::new(pipeline_with(
        MockSegmenter::pass_through(),
        PipelineConfig::default(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.process_async(product_on_white(), no_shadow()).await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.image.dimensions(), (260, 340));
    }
}
