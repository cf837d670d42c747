use std::collections::TryReserveError;

use thiserror::Error;

use crate::source::PixelFormat;

/// Result type alias for operations that may fail with [`BlendError`].
pub type BlendResult<T> = std::result::Result<T, BlendError>;

/// Coarse classification of a [`BlendError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inputs disagree in size, format, or coverage.
    InputInconsistency,
    /// A contour or seam collapsed into something unusable.
    GeometricDegeneracy,
    /// Memory or worker threads could not be obtained.
    ResourceExhaustion,
    /// Writing an output or intermediate artifact failed.
    Export,
}

/// Error types that can occur while generating seams or compositing.
#[derive(Debug, Error)]
pub enum BlendError {
    /// No source images were supplied.
    #[error("At least one source image is required")]
    NoImages,
    /// A source image uses a different pixel format than the first one.
    #[error("Image {index} has pixel format {found:?}, expected {expected:?}")]
    PixelFormatMismatch {
        index: usize,
        expected: PixelFormat,
        found: PixelFormat,
    },
    /// Alpha footprint dimensions do not match the source image.
    #[error("Alpha size {found:?} does not match source image size {expected:?}")]
    AlphaMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// The number of weight maps differs from the number of images.
    #[error("Got {weights} weight maps for {images} images")]
    WeightCountMismatch { images: usize, weights: usize },
    /// A weight map is not the same size as its image.
    #[error("Weight map {index} is {found:?}, expected {expected:?}")]
    WeightSizeMismatch {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// A source image covers no pixel at all.
    #[error("Image {index} has an empty alpha footprint")]
    EmptyFootprint { index: usize },
    /// The decoded image uses a color type this crate cannot composite.
    #[error("Unsupported color type {0:?}")]
    UnsupportedFormat(image::ColorType),
    /// One side of a seam has no pixels of its own, so no seam exists.
    #[error("Overlap is degenerate: {0}")]
    DegenerateOverlap(&'static str),
    /// A contour lost every usable vertex.
    #[error("Contour degenerated: {0}")]
    DegenerateContour(String),
    /// A buffer allocation was refused.
    #[error("Could not allocate {elements} raster elements: {source}")]
    Allocation {
        elements: usize,
        #[source]
        source: TryReserveError,
    },
    /// The worker pool could not be created.
    #[error("Thread pool creation failed: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// Image encoding or decoding error.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),
    /// File system I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Blending image `index` into the composite of the images before it failed.
    #[error("Blending image {index} into the composite of images 0..{index} failed: {source}")]
    PairFailed {
        index: usize,
        #[source]
        source: Box<BlendError>,
    },
}

impl BlendError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlendError::NoImages
            | BlendError::PixelFormatMismatch { .. }
            | BlendError::AlphaMismatch { .. }
            | BlendError::WeightCountMismatch { .. }
            | BlendError::WeightSizeMismatch { .. }
            | BlendError::EmptyFootprint { .. }
            | BlendError::UnsupportedFormat(_)
            | BlendError::DegenerateOverlap(_) => ErrorKind::InputInconsistency,
            BlendError::DegenerateContour(_) => ErrorKind::GeometricDegeneracy,
            BlendError::Allocation { .. } | BlendError::ThreadPool(_) => {
                ErrorKind::ResourceExhaustion
            }
            BlendError::Image(_) | BlendError::Io(_) => ErrorKind::Export,
            BlendError::PairFailed { source, .. } => source.kind(),
        }
    }

    pub(crate) fn in_pair(self, index: usize) -> Self {
        match self {
            already @ BlendError::PairFailed { .. } => already,
            other => BlendError::PairFailed {
                index,
                source: Box::new(other),
            },
        }
    }
}
