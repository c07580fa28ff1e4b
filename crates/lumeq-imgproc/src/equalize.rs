use log::debug;

use lumeq_image::Image;

use crate::clip::ClipFactor;
use crate::error::EqualizeError;
use crate::histogram::compute_histogram;
use crate::lut::{apply_lookup_table, create_equalization_lut, LookupTable};
use crate::parallel::ExecutionStrategy;

/// Parameters of the histogram equalization.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EqualizeParams {
    /// Contrast limit. Clipping is disabled by default.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clip_factor: ClipFactor,
    /// How to split the per pixel stages across threads.
    #[cfg_attr(feature = "serde", serde(default))]
    pub strategy: ExecutionStrategy,
}

impl EqualizeParams {
    /// Set the clip factor.
    pub fn with_clip_factor(mut self, clip_factor: ClipFactor) -> Self {
        self.clip_factor = clip_factor;
        self
    }

    /// Set the execution strategy.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Equalize the histogram of an 8-bit single channel image.
///
/// Builds the intensity histogram of `src`, derives the (optionally contrast
/// limited) equalization lookup table from it and remaps `src` into `dst`.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `dst` - The output image, with the same size as `src`.
/// * `params` - The equalization parameters.
///
/// # Returns
///
/// The lookup table used to remap the image, to inspect it or to apply it to
/// other images with the same intensity statistics.
///
/// # Errors
///
/// Returns an error if the sizes of `src` and `dst` do not match or if the
/// execution strategy is invalid. `dst` is left untouched in both cases.
///
/// # Example
///
/// ```
/// use lumeq_image::{Image, ImageSize};
/// use lumeq_imgproc::clip::ClipFactor;
/// use lumeq_imgproc::equalize::{equalize_histogram, EqualizeParams};
///
/// let src = Image::<u8, 1>::new(
///     ImageSize { width: 4, height: 1 },
///     vec![10, 11, 12, 13],
/// ).unwrap();
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// let params = EqualizeParams::default().with_clip_factor(ClipFactor::new(0.0).unwrap());
/// let lut = equalize_histogram(&src, &mut dst, &params).unwrap();
///
/// assert_eq!(dst.as_slice(), &[64, 128, 191, 255]);
/// assert!(lut.is_monotonic());
/// ```
pub fn equalize_histogram(
    src: &Image<u8, 1>,
    dst: &mut Image<u8, 1>,
    params: &EqualizeParams,
) -> Result<LookupTable, EqualizeError> {
    if src.size() != dst.size() {
        return Err(lumeq_image::ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        )
        .into());
    }

    let hist = compute_histogram(src, params.strategy)?;
    let lut = create_equalization_lut(&hist, params.clip_factor);

    debug!(
        "equalize {}: mass={} clip_factor={} lut=[{}..{}]",
        src.size(),
        hist.total(),
        params.clip_factor,
        lut[0],
        lut[255]
    );

    apply_lookup_table(src, &lut, dst, params.strategy)?;

    Ok(lut)
}

/// Equalize the histogram of an image into a freshly allocated image.
///
/// See [`equalize_histogram`].
pub fn equalize_histogram_new(
    src: &Image<u8, 1>,
    params: &EqualizeParams,
) -> Result<(Image<u8, 1>, LookupTable), EqualizeError> {
    let mut dst = Image::from_size_val(src.size(), 0u8)?;
    let lut = equalize_histogram(src, &mut dst, params)?;
    Ok((dst, lut))
}
