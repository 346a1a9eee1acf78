//! Segmentation adapter and the shared segmentation handle
//!
//! The segmentation model is an external collaborator reached through the
//! [`Segmenter`] trait: PNG-encoded RGB bytes in, PNG-encoded RGBA bytes out.
//! A [`SegmentationSession`] is built once per process and handed to every
//! pipeline by reference; it creates the segmenter lazily, at most once.

use crate::{
    config::SegmentationConfig,
    error::SegmentationError,
    services::ImageIOService,
    types::RasterImage,
};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

/// External foreground/background segmentation capability
pub trait Segmenter: Send + Sync {
    /// Short backend name used in logs and reports
    fn name(&self) -> &str;

    /// Remove the background from a PNG-encoded RGB image
    ///
    /// # Errors
    /// - [`SegmentationError::Unavailable`] when the backend cannot run at all
    /// - [`SegmentationError::Backend`] when inference fails
    fn remove_background(&self, png_rgb: &[u8]) -> Result<Vec<u8>, SegmentationError>;
}

/// Factory trait for creating the segmenter on first use
pub trait SegmenterFactory: Send + Sync {
    /// Build the segmenter (load the model, open the session, ...)
    ///
    /// # Errors
    /// - [`SegmentationError::Unavailable`] for missing models or configuration
    fn create(&self) -> Result<Box<dyn Segmenter>, SegmentationError>;
}

/// Process-wide segmentation handle
///
/// Construct once at start-up and share (`&` or `Arc`) across pipelines and
/// threads. The factory runs at most once; an initialisation failure is
/// remembered and every later call sees the capability as unavailable.
pub struct SegmentationSession {
    factory: Option<Box<dyn SegmenterFactory>>,
    handle: OnceLock<Option<Box<dyn Segmenter>>>,
}

impl SegmentationSession {
    /// Lazily initialised session backed by `factory`
    #[must_use]
    pub fn new(factory: Box<dyn SegmenterFactory>) -> Self {
        Self {
            factory: Some(factory),
            handle: OnceLock::new(),
        }
    }

    /// Session around an already-built segmenter
    #[must_use]
    pub fn with_segmenter(segmenter: Box<dyn Segmenter>) -> Self {
        let handle = OnceLock::new();
        let _ = handle.set(Some(segmenter));
        Self {
            factory: None,
            handle,
        }
    }

    /// Session with no segmentation capability configured
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            factory: None,
            handle: OnceLock::new(),
        }
    }

    /// Session over the bundled backend for `config`
    ///
    /// Without the `tract` feature the session is unavailable and every
    /// image takes the opaque-repair path.
    #[must_use]
    pub fn from_config(config: &SegmentationConfig) -> Self {
        #[cfg(feature = "tract")]
        {
            Self::new(Box::new(crate::backends::TractSegmenterFactory::new(config.clone())))
        }
        #[cfg(not(feature = "tract"))]
        {
            debug!(model = ?config.model_path, "No segmentation backend compiled in");
            Self::unavailable()
        }
    }

    /// The segmenter, initialising it on first call
    pub fn segmenter(&self) -> Option<&dyn Segmenter> {
        self.handle
            .get_or_init(|| {
                let Some(factory) = &self.factory else {
                    warn!("No segmentation backend configured, background removal disabled");
                    return None;
                };
                match factory.create() {
                    Ok(segmenter) => {
                        info!(backend = segmenter.name(), "Segmentation session initialized");
                        Some(segmenter)
                    },
                    Err(e) => {
                        warn!("Segmentation backend failed to initialize: {e}");
                        None
                    },
                }
            })
            .as_deref()
    }

    /// True once initialisation has been attempted
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }
}

impl fmt::Debug for SegmentationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.handle.get() {
            None => "uninitialized",
            Some(None) => "unavailable",
            Some(Some(_)) => "ready",
        };
        f.debug_struct("SegmentationSession")
            .field("state", &state)
            .finish()
    }
}

/// What happened at the segmentation boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentationOutcome {
    /// Backend returned a decodable RGBA cutout
    Segmented { backend: String },
    /// No backend; the input continues as a fully opaque copy
    Unavailable(String),
    /// Backend ran but its output was unusable; the original passes through
    Failed(SegmentationError),
}

impl SegmentationOutcome {
    /// Whether downstream stages should run on the returned image
    #[must_use]
    pub fn continues(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Run the segmentation capability on `image`
///
/// Never fails: unavailability yields an opaque copy (caught later by
/// validation) and corrupt output yields the original image unchanged.
pub fn segment(
    session: &SegmentationSession,
    image: RasterImage,
) -> (RasterImage, SegmentationOutcome) {
    let Some(segmenter) = session.segmenter() else {
        warn!("Segmentation unavailable, continuing with opaque copy of the input");
        return (
            image.into_opaque(),
            SegmentationOutcome::Unavailable("no segmentation backend".to_string()),
        );
    };

    let (width, height) = image.dimensions();
    info!(
        backend = segmenter.name(),
        width, height, "Starting segmentation"
    );

    let png_rgb = match ImageIOService::encode_rgb_png(&image) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(width, height, "Failed to encode segmentation input: {e}");
            return (
                image,
                SegmentationOutcome::Failed(SegmentationError::io(e.to_string())),
            );
        },
    };

    let output = match segmenter.remove_background(&png_rgb) {
        Ok(bytes) => bytes,
        Err(SegmentationError::Unavailable(reason)) => {
            warn!("Segmentation unavailable ({reason}), continuing with opaque copy");
            return (image.into_opaque(), SegmentationOutcome::Unavailable(reason));
        },
        Err(e) => {
            error!(
                backend = segmenter.name(),
                width,
                height,
                input_bytes = png_rgb.len(),
                "Segmentation failed: {e}"
            );
            return (image, SegmentationOutcome::Failed(e));
        },
    };

    match ImageIOService::decode(&output) {
        Ok(cutout) => {
            debug!(
                width = cutout.width(),
                height = cutout.height(),
                "Segmentation returned cutout"
            );
            (
                cutout,
                SegmentationOutcome::Segmented {
                    backend: segmenter.name().to_string(),
                },
            )
        },
        Err(e) => {
            error!(
                backend = segmenter.name(),
                width,
                height,
                output_bytes = output.len(),
                "Segmentation returned undecodable output: {e}"
            );
            (
                image,
                SegmentationOutcome::Failed(SegmentationError::io(e.to_string())),
            )
        },
    }
}
