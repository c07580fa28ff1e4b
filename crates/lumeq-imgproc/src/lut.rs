use log::debug;

use lumeq_image::{Image, ImageError};

use crate::clip::{clip_histogram, compute_clip_level, ClipFactor};
use crate::error::EqualizeError;
use crate::histogram::{accumulate_histogram, normalize_histogram, Histogram, NUM_BINS};
use crate::parallel::{self, ExecutionStrategy};

/// A byte to byte remapping function: `value_out = lut[value_in]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LookupTable([u8; NUM_BINS]);

impl Default for LookupTable {
    fn default() -> Self {
        Self::identity()
    }
}

impl LookupTable {
    /// The table mapping every value onto itself.
    pub fn identity() -> Self {
        let mut table = [0u8; NUM_BINS];
        table
            .iter_mut()
            .enumerate()
            .for_each(|(i, v)| *v = i as u8);
        Self(table)
    }

    /// Create a table from its 256 entries.
    pub fn from_array(table: [u8; NUM_BINS]) -> Self {
        Self(table)
    }

    /// Create a table from a slice of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice does not hold exactly 256 entries.
    pub fn try_from_slice(table: &[u8]) -> Result<Self, EqualizeError> {
        let table: [u8; NUM_BINS] = table
            .try_into()
            .map_err(|_| EqualizeError::InvalidLookupTableSize(table.len()))?;
        Ok(Self(table))
    }

    /// Get the entries as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Map a single value through the table.
    #[inline]
    pub fn get(&self, value: u8) -> u8 {
        self.0[value as usize]
    }

    /// Whether the table never maps a larger input onto a smaller output.
    pub fn is_monotonic(&self) -> bool {
        self.0.windows(2).all(|w| w[0] <= w[1])
    }
}

impl std::ops::Index<u8> for LookupTable {
    type Output = u8;

    fn index(&self, index: u8) -> &Self::Output {
        &self.0[index as usize]
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for LookupTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for LookupTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let table = Vec::<u8>::deserialize(deserializer)?;
        Self::try_from_slice(&table).map_err(serde::de::Error::custom)
    }
}

/// Create the equalization lookup table of a raw histogram.
///
/// If the clip factor is enabled the raw histogram is first clipped at the
/// level given by [`compute_clip_level`]. The (clipped) histogram is then
/// normalized and accumulated, and its cumulative distribution in `[0, 1]` is
/// scaled to `[0, 255]` and rounded to the nearest byte.
///
/// The table is monotonic non-decreasing. A histogram without mass yields the
/// identity table.
///
/// # Arguments
///
/// * `hist` - The raw histogram of the image, as given by
///   [`compute_histogram`](crate::histogram::compute_histogram).
/// * `s` - The clip factor.
///
/// # Example
///
/// ```
/// use lumeq_imgproc::clip::ClipFactor;
/// use lumeq_imgproc::histogram::Histogram;
/// use lumeq_imgproc::lut::create_equalization_lut;
///
/// let mut counts = vec![0; 256];
/// counts[100] = 1;
/// counts[101] = 1;
/// let hist = Histogram::from_counts(&counts).unwrap();
///
/// let lut = create_equalization_lut(&hist, ClipFactor::DISABLED);
/// assert_eq!(lut[100], 128);
/// assert_eq!(lut[101], 255);
/// assert!(lut.is_monotonic());
/// ```
pub fn create_equalization_lut(hist: &Histogram, s: ClipFactor) -> LookupTable {
    if hist.is_empty() {
        return LookupTable::identity();
    }

    let mut cdf = *hist;

    if s.is_enabled() {
        let cl = compute_clip_level(hist, s);
        debug!("clipping histogram at {}", cl);
        clip_histogram(&mut cdf, cl);
    }

    normalize_histogram(&mut cdf);
    accumulate_histogram(&mut cdf);

    let mut table = [0u8; NUM_BINS];
    table
        .iter_mut()
        .zip(cdf.iter())
        .for_each(|(dst, &p)| *dst = (p * 255.0).round().clamp(0.0, 255.0) as u8);

    LookupTable(table)
}

/// Remap every pixel of an image through a lookup table.
///
/// # Arguments
///
/// * `src` - The input 8-bit single channel image.
/// * `lut` - The lookup table.
/// * `dst` - The output image, with the same size as `src`.
/// * `strategy` - How to split the remapping across threads.
///
/// # Errors
///
/// Returns an error if the sizes of `src` and `dst` do not match, or if the
/// execution strategy is invalid. `dst` is left untouched in both cases.
///
/// # Example
///
/// ```
/// use lumeq_image::{Image, ImageSize};
/// use lumeq_imgproc::lut::{apply_lookup_table, LookupTable};
/// use lumeq_imgproc::parallel::ExecutionStrategy;
///
/// let mut table = [0u8; 256];
/// table[1] = 10;
/// table[2] = 20;
/// let lut = LookupTable::from_array(table);
///
/// let src = Image::<u8, 1>::new(ImageSize { width: 2, height: 1 }, vec![1, 2]).unwrap();
/// let mut dst = Image::<u8, 1>::from_size_val(src.size(), 0).unwrap();
///
/// apply_lookup_table(&src, &lut, &mut dst, ExecutionStrategy::Serial).unwrap();
/// assert_eq!(dst.as_slice(), &[10, 20]);
/// ```
pub fn apply_lookup_table(
    src: &Image<u8, 1>,
    lut: &LookupTable,
    dst: &mut Image<u8, 1>,
    strategy: ExecutionStrategy,
) -> Result<(), EqualizeError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        )
        .into());
    }

    parallel::zip_chunks_with(src.as_slice(), dst.as_slice_mut(), strategy, |s, d| {
        s.iter().zip(d.iter_mut()).for_each(|(s, d)| *d = lut.get(*s));
    })?;

    Ok(())
}

/// Remap every pixel of an image through a lookup table, reusing its buffer.
///
/// # Errors
///
/// Returns an error if the execution strategy is invalid, the image is left
/// untouched in that case.
pub fn apply_lookup_table_inplace(
    image: &mut Image<u8, 1>,
    lut: &LookupTable,
    strategy: ExecutionStrategy,
) -> Result<(), EqualizeError> {
    parallel::chunks_mut_with(image.as_slice_mut(), strategy, |chunk| {
        chunk.iter_mut().for_each(|v| *v = lut.get(*v));
    })?;

    Ok(())
}
