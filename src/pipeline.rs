//! Cutout pipeline orchestration
//!
//! Segmentation → validation → (background inference → mask refinement) →
//! autocrop → edge smoothing → optional drop shadow. Every recoverable
//! condition degrades to the best available image and is recorded in the
//! [`PipelineReport`]; only undecodable input is a hard failure.

use crate::{
    background::infer_background,
    config::PipelineConfig,
    crop::{autocrop, CropOutcome},
    error::{CutoutError, Result},
    refine::{apply_mask, refiner_for, RefineParams},
    segmentation::{segment, SegmentationOutcome, SegmentationSession},
    services::{ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate},
    shadow::{apply_shadow, ShadowOutcome},
    smooth::smooth_edges,
    types::{Color, ProcessingTimings, RasterImage, ShadowSpec},
    validation::{detect_residual_backdrop, has_transparency, Backdrop},
};
use instant::Instant;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Default shadow intensity for the collage preset
pub const DEFAULT_SHADOW_INTENSITY: u8 = 70;

/// Per-call switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Run segmentation and repair; when off the input is only normalised
    pub remove_background: bool,
    /// Composite the collage shadow (only when the background was removed)
    pub add_shadow: bool,
    /// Shadow opacity, 0-255
    pub shadow_intensity: u8,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            remove_background: true,
            add_shadow: true,
            shadow_intensity: DEFAULT_SHADOW_INTENSITY,
        }
    }
}

/// What the validation/repair branch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Cutout had transparency and no residual backdrop
    NotNeeded,
    /// Mask rebuilt against `background`
    Refined {
        background: Color,
        threshold: u8,
        /// Set for the black/white residual-backdrop pass
        residual: Option<Backdrop>,
        refiner: &'static str,
    },
    /// No transparency and no usable background samples; passed through
    BackgroundUnknown,
    /// Repair did not run (segmentation failed or removal disabled)
    Skipped,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub segmentation: Option<SegmentationOutcome>,
    pub repair: RepairOutcome,
    pub crop: Option<CropOutcome>,
    pub shadow: ShadowOutcome,
    pub original_dimensions: (u32, u32),
    pub final_dimensions: (u32, u32),
    /// Whether the returned image has any transparency
    pub has_transparency: bool,
    pub timings: ProcessingTimings,
}

/// Pipeline output
#[derive(Debug, Clone)]
pub struct CutoutResult {
    pub image: RasterImage,
    pub report: PipelineReport,
}

impl CutoutResult {
    /// Encode the result as PNG
    ///
    /// # Errors
    /// - PNG encoder failure
    pub fn to_png(&self) -> Result<Vec<u8>> {
        ImageIOService::encode_png(&self.image)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// The cutout repair and compositing pipeline
///
/// Stateless apart from its configuration and the shared segmentation
/// session, so one instance can serve concurrent calls on different images.
pub struct CutoutPipeline {
    config: PipelineConfig,
    session: Arc<SegmentationSession>,
    reporter: Arc<dyn ProgressReporter>,
}

impl CutoutPipeline {
    /// Create a pipeline over a shared segmentation session
    ///
    /// # Errors
    /// - Configuration fails validation
    pub fn new(config: PipelineConfig, session: Arc<SegmentationSession>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session,
            reporter: Arc::new(NoOpProgressReporter),
        })
    }

    /// Attach a progress reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &SegmentationSession {
        &self.session
    }

    /// Run the full pipeline using the configured shadow (if any)
    ///
    /// # Errors
    /// - Internal raster errors only; recoverable conditions never fail
    pub fn process(&self, image: RasterImage) -> Result<CutoutResult> {
        self.run(image, true, self.config.shadow)
    }

    /// Decode bytes and run the full pipeline
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<CutoutResult> {
        let image = ImageIOService::decode(bytes)?;
        self.process(image)
    }

    /// Run with per-call switches
    ///
    /// The collage shadow preset with `shadow_intensity` replaces the
    /// configured shadow when `add_shadow` is set.
    ///
    /// # Errors
    /// - Internal raster errors only
    pub fn process_with(&self, image: RasterImage, options: &ProcessOptions) -> Result<CutoutResult> {
        let shadow = options
            .add_shadow
            .then(|| ShadowSpec::collage(options.shadow_intensity));
        self.run(image, options.remove_background, shadow)
    }

    /// Run [`process_with`](Self::process_with) on the blocking thread pool
    ///
    /// # Errors
    /// - The blocking task panicked or was cancelled
    /// - Any error from `process_with`
    pub async fn process_async(
        self: Arc<Self>,
        image: RasterImage,
        options: ProcessOptions,
    ) -> Result<CutoutResult> {
        tokio::task::spawn_blocking(move || self.process_with(image, &options))
            .await
            .map_err(|e| CutoutError::internal(format!("pipeline task failed: {e}")))?
    }

    fn stage(&self, stage: ProcessingStage, start: Instant) {
        self.reporter.report_progress(ProgressUpdate::new(stage, start));
    }

    #[instrument(
        skip(self, image, shadow),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    fn run(
        &self,
        image: RasterImage,
        remove_background: bool,
        shadow: Option<ShadowSpec>,
    ) -> Result<CutoutResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::new();
        let original_dimensions = image.dimensions();

        if !remove_background {
            info!("Background removal disabled, returning normalised input");
            return Ok(self.finish(
                image,
                PipelineReport {
                    segmentation: None,
                    repair: RepairOutcome::Skipped,
                    crop: None,
                    shadow: ShadowOutcome::Skipped,
                    original_dimensions,
                    final_dimensions: original_dimensions,
                    has_transparency: false,
                    timings,
                },
                total_start,
            ));
        }

        self.stage(ProcessingStage::Segmentation, total_start);
        let stage_start = Instant::now();
        let (image, segmentation) = segment(&self.session, image);
        timings.segmentation_ms = elapsed_ms(stage_start);

        if let SegmentationOutcome::Failed(e) = &segmentation {
            self.reporter
                .report_error(ProcessingStage::Segmentation, &e.to_string());
            return Ok(self.finish(
                image,
                PipelineReport {
                    segmentation: Some(segmentation),
                    repair: RepairOutcome::Skipped,
                    crop: None,
                    shadow: ShadowOutcome::Skipped,
                    original_dimensions,
                    final_dimensions: original_dimensions,
                    has_transparency: false,
                    timings,
                },
                total_start,
            ));
        }

        let stage_start = Instant::now();
        let (image, repair) = self.repair(image, total_start)?;
        timings.repair_ms = elapsed_ms(stage_start);

        self.stage(ProcessingStage::AutoCrop, total_start);
        let stage_start = Instant::now();
        let (image, crop) = autocrop(image, &self.config.thresholds);
        timings.crop_ms = elapsed_ms(stage_start);

        self.stage(ProcessingStage::EdgeSmoothing, total_start);
        let stage_start = Instant::now();
        let image = smooth_edges(image, self.config.edge_smoothing_radius);
        timings.smoothing_ms = elapsed_ms(stage_start);

        let (image, shadow) = match shadow {
            Some(spec) => {
                self.stage(ProcessingStage::ShadowComposition, total_start);
                let stage_start = Instant::now();
                let (image, outcome) = apply_shadow(image, &spec);
                timings.shadow_ms = elapsed_ms(stage_start);
                if let ShadowOutcome::Failed(e) = &outcome {
                    self.reporter
                        .report_error(ProcessingStage::ShadowComposition, &e.to_string());
                }
                (image, outcome)
            },
            None => (image, ShadowOutcome::Skipped),
        };

        let final_dimensions = image.dimensions();
        Ok(self.finish(
            image,
            PipelineReport {
                segmentation: Some(segmentation),
                repair,
                crop: Some(crop),
                shadow,
                original_dimensions,
                final_dimensions,
                has_transparency: false,
                timings,
            },
            total_start,
        ))
    }

    /// Validation and, when needed, background inference plus refinement
    fn repair(&self, image: RasterImage, total_start: Instant) -> Result<(RasterImage, RepairOutcome)> {
        let thresholds = &self.config.thresholds;
        let refiner = refiner_for(self.config.refine_strategy);

        self.stage(ProcessingStage::Validation, total_start);
        let (alpha_lo, alpha_hi) = image.alpha_extrema();
        let [r, g, b] = image.rgb_extrema();
        info!(alpha = ?(alpha_lo, alpha_hi), red = ?r, green = ?g, blue = ?b, "Segmentation output extrema");

        let (params, residual) = if has_transparency(&image) {
            match detect_residual_backdrop(&image, thresholds, self.config.sample_edge_midpoints) {
                Some(backdrop) => {
                    warn!(%backdrop, "Residual backdrop detected, clearing it");
                    (
                        RefineParams::gated(
                            backdrop.color(),
                            thresholds.residual_distance,
                            thresholds.residual_alpha_gate,
                        ),
                        Some(backdrop),
                    )
                },
                None => return Ok((image, RepairOutcome::NotNeeded)),
            }
        } else {
            warn!("Segmentation output is fully opaque, inferring background");
            self.stage(ProcessingStage::BackgroundInference, total_start);
            let alpha = image.alpha_mask();
            match infer_background(&image, &alpha, thresholds) {
                Some(background) => {
                    info!(%background, "Detected background colour");
                    (
                        RefineParams::unconditional(background, thresholds.background_distance),
                        None,
                    )
                },
                None => {
                    warn!("No usable background samples, passing image through uncorrected");
                    return Ok((image, RepairOutcome::BackgroundUnknown));
                },
            }
        };

        self.stage(ProcessingStage::MaskRefinement, total_start);
        let mask = refiner.refine_mask(&image, &image.alpha_mask(), &params)?;
        let image = apply_mask(image, &mask)?;

        let extrema = image.alpha_extrema();
        if has_transparency(&image) {
            info!(alpha = ?extrema, refiner = refiner.name(), "Transparency created from mask");
        } else {
            warn!("Image still has no transparency after refinement, background may remain");
        }

        Ok((
            image,
            RepairOutcome::Refined {
                background: params.background,
                threshold: params.threshold,
                residual,
                refiner: refiner.name(),
            },
        ))
    }

    fn finish(
        &self,
        image: RasterImage,
        mut report: PipelineReport,
        total_start: Instant,
    ) -> CutoutResult {
        report.timings.total_ms = elapsed_ms(total_start);
        report.final_dimensions = image.dimensions();
        report.has_transparency = has_transparency(&image);
        self.reporter.report_completion(&report.timings);
        info!(
            from = ?report.original_dimensions,
            to = ?report.final_dimensions,
            total_ms = report.timings.total_ms,
            "Cutout pipeline finished"
        );
        CutoutResult { image, report }
    }
}

impl std::fmt::Debug for CutoutPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutoutPipeline")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockSegmenter;
    use crate::services::RecordingProgressReporter;
    use crate::types::AlphaMask;
    use image::Rgba;

    fn pipeline(segmenter: MockSegmenter) -> CutoutPipeline {
        let session = Arc::new(SegmentationSession::with_segmenter(Box::new(segmenter)));
        CutoutPipeline::new(PipelineConfig::default(), session).unwrap()
    }

    fn subject_on_white(width: u32, height: u32) -> RasterImage {
        let mut pixels = RasterImage::filled(width, height, [255, 255, 255, 255])
            .unwrap()
            .into_rgba();
        for y in height / 4..height * 3 / 4 {
            for x in width / 4..width * 3 / 4 {
                pixels.put_pixel(x, y, Rgba([30, 90, 160, 255]));
            }
        }
        RasterImage::from_rgba(pixels).unwrap()
    }

    #[test]
    fn test_opaque_output_is_repaired() {
        let result = pipeline(MockSegmenter::pass_through())
            .process(subject_on_white(40, 40))
            .unwrap();

        assert_eq!(result.image.dimensions(), (20, 20));
        assert_eq!(
            result.report.repair,
            RepairOutcome::Refined {
                background: Color::WHITE,
                threshold: 30,
                residual: None,
                refiner: "vectorized",
            }
        );
        assert_eq!(result.image.pixel(10, 10), [30, 90, 160, 255]);
    }

    #[test]
    fn test_residual_white_backdrop_is_cleared() {
        // Good cutout except a white band on the left edge
        let mut mask = vec![0u8; 30 * 30];
        for y in 0..30usize {
            for x in 0..30usize {
                if x < 5 || ((10..20).contains(&x) && (10..20).contains(&y)) {
                    mask[y * 30 + x] = 255;
                }
            }
        }
        let mask = AlphaMask::new(30, 30, mask).unwrap();
        let mut input = subject_on_white(30, 30).into_rgba();
        for y in 10..20 {
            for x in 10..20 {
                input.put_pixel(x, y, Rgba([30, 90, 160, 255]));
            }
        }
        let input = RasterImage::from_rgba(input).unwrap();

        let result = pipeline(MockSegmenter::with_mask(mask)).process(input).unwrap();
        assert!(matches!(
            result.report.repair,
            RepairOutcome::Refined {
                residual: Some(Backdrop::White),
                threshold: 20,
                ..
            }
        ));
        assert_eq!(result.image.dimensions(), (10, 10));
    }

    #[test]
    fn test_failed_segmentation_returns_original() {
        let input = subject_on_white(12, 12);
        let result = pipeline(MockSegmenter::corrupt()).process(input.clone()).unwrap();
        assert_eq!(result.image, input);
        assert_eq!(result.report.repair, RepairOutcome::Skipped);
        assert!(result.report.crop.is_none());
    }

    #[test]
    fn test_remove_disabled_skips_everything() {
        let mock = MockSegmenter::circular();
        let history = mock.call_history_handle();
        let input = subject_on_white(12, 12);
        let options = ProcessOptions {
            remove_background: false,
            ..ProcessOptions::default()
        };

        let result = pipeline(mock).process_with(input.clone(), &options).unwrap();
        assert_eq!(result.image, input);
        assert_eq!(result.report.shadow, ShadowOutcome::Skipped);
        assert!(history.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stage_order() {
        let reporter = Arc::new(RecordingProgressReporter::new());
        let pipeline = pipeline(MockSegmenter::pass_through()).with_reporter(reporter.clone());
        pipeline
            .process_with(subject_on_white(24, 24), &ProcessOptions::default())
            .unwrap();

        assert_eq!(
            reporter.stages(),
            vec![
                ProcessingStage::Segmentation,
                ProcessingStage::Validation,
                ProcessingStage::BackgroundInference,
                ProcessingStage::MaskRefinement,
                ProcessingStage::AutoCrop,
                ProcessingStage::EdgeSmoothing,
                ProcessingStage::ShadowComposition,
                ProcessingStage::Completed,
            ]
        );
    }
}
