#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// contrast limiting: clip level search and histogram clipping.
pub mod clip;

/// histogram equalization of whole images.
pub mod equalize;

/// error types for the image processing operations.
pub mod error;

/// compute and transform image histograms.
pub mod histogram;

/// lookup table construction and application.
pub mod lut;

/// module containing parallization utilities.
pub mod parallel;

pub use crate::error::EqualizeError;
