//! Progress reporting service
//!
//! The pipeline announces each stage before running it. Frontends use this
//! for progress output; tests use it to check stage ordering.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::Mutex;
use tracing::{error, info};

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    /// Calling the external segmentation capability
    Segmentation,
    /// Checking whether the cutout has usable transparency
    Validation,
    /// Estimating the implicit background colour
    BackgroundInference,
    /// Rebuilding the alpha mask by colour distance
    MaskRefinement,
    /// Tight crop to the non-transparent region
    AutoCrop,
    /// Blurring the final alpha channel
    EdgeSmoothing,
    /// Compositing the drop shadow
    ShadowComposition,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Segmentation => "Running segmentation",
            ProcessingStage::Validation => "Validating transparency",
            ProcessingStage::BackgroundInference => "Inferring background colour",
            ProcessingStage::MaskRefinement => "Refining alpha mask",
            ProcessingStage::AutoCrop => "Cropping transparent margins",
            ProcessingStage::EdgeSmoothing => "Smoothing cutout edges",
            ProcessingStage::ShadowComposition => "Compositing drop shadow",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Segmentation => 10,
            ProcessingStage::Validation => 60,
            ProcessingStage::BackgroundInference => 65,
            ProcessingStage::MaskRefinement => 70,
            ProcessingStage::AutoCrop => 80,
            ProcessingStage::EdgeSmoothing => 88,
            ProcessingStage::ShadowComposition => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for reporting progress during pipeline runs
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report a recovered failure during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Progress reporter that emits tracing events
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress, update.description, update.elapsed_ms
            );
        } else {
            info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        info!("Cutout completed in {}ms", timings.total_ms);

        if self.verbose {
            info!("  segmentation: {}ms", timings.segmentation_ms);
            info!("  repair: {}ms", timings.repair_ms);
            info!("  crop: {}ms", timings.crop_ms);
            info!("  smoothing: {}ms", timings.smoothing_ms);
            info!("  shadow: {}ms", timings.shadow_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        error!("Error during {}: {}", stage.description(), error);
    }
}

/// Reporter that keeps every stage it sees, in order
#[derive(Default)]
pub struct RecordingProgressReporter {
    stages: Mutex<Vec<ProcessingStage>>,
    errors: Mutex<Vec<(ProcessingStage, String)>>,
}

impl RecordingProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages reported so far
    #[must_use]
    pub fn stages(&self) -> Vec<ProcessingStage> {
        self.stages.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Recovered errors reported so far
    #[must_use]
    pub fn errors(&self) -> Vec<(ProcessingStage, String)> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if let Ok(mut stages) = self.stages.lock() {
            stages.push(update.stage);
        }
    }

    fn report_completion(&self, _timings: &ProcessingTimings) {
        if let Ok(mut stages) = self.stages.lock() {
            stages.push(ProcessingStage::Completed);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push((stage, error.to_string()));
        }
    }
}
