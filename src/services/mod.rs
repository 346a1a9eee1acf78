//! Service layer
//!
//! Separates codec/file infrastructure and progress reporting from the
//! pixel-processing stages.

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressUpdate, RecordingProgressReporter,
};
