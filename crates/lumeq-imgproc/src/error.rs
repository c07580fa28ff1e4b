use crate::parallel::ParallelError;

/// Errors that can occur while equalizing an image.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EqualizeError {
    /// Error related to image.
    #[error(transparent)]
    ImageError(#[from] lumeq_image::ImageError),

    /// Error related to the parallel execution of an operation.
    #[error(transparent)]
    ParallelError(#[from] ParallelError),

    /// The number of histogram bins must be in the range [1, 256].
    #[error("Invalid number of histogram bins: {0}")]
    InvalidHistogramBins(usize),

    /// Histogram bins must be finite and non-negative.
    #[error("Invalid value {1} in histogram bin {0}")]
    InvalidHistogramValue(usize, f64),

    /// The clip factor must be finite and non-negative.
    #[error("Invalid clip factor: {0}")]
    InvalidClipFactor(f64),

    /// A lookup table must hold exactly 256 entries.
    #[error("Invalid lookup table size: expected 256 entries, got {0}")]
    InvalidLookupTableSize(usize),
}
