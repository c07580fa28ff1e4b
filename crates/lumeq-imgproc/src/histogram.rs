use lumeq_image::Image;

use crate::error::EqualizeError;
use crate::parallel::{self, ExecutionStrategy};

/// Number of intensity levels of an 8-bit image.
pub const NUM_BINS: usize = 256;

/// Intensity histogram of an 8-bit single channel image.
///
/// Bin `i` holds the (possibly normalized or accumulated) mass of intensity
/// level `i`. All bins are finite and non-negative, so a histogram whose total
/// is zero has no mass in any bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Histogram([f64; NUM_BINS]);

impl Default for Histogram {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Histogram {
    /// Create a histogram with all bins set to zero.
    pub fn zeros() -> Self {
        Self([0.0; NUM_BINS])
    }

    /// Create a histogram from raw occurrence counts.
    ///
    /// # Errors
    ///
    /// Returns an error if `counts` does not hold exactly 256 entries.
    pub fn from_counts(counts: &[usize]) -> Result<Self, EqualizeError> {
        if counts.len() != NUM_BINS {
            return Err(EqualizeError::InvalidHistogramBins(counts.len()));
        }
        let mut hist = Self::zeros();
        hist.0
            .iter_mut()
            .zip(counts.iter())
            .for_each(|(bin, &count)| *bin = count as f64);
        Ok(hist)
    }

    /// Get the bins as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Create a histogram from the mass of every bin.
    ///
    /// # Errors
    ///
    /// Returns an error if a bin is negative, NaN or infinite.
    pub fn from_bins(bins: [f64; NUM_BINS]) -> Result<Self, EqualizeError> {
        match bins.iter().position(|h| !h.is_finite() || *h < 0.0) {
            Some(i) => Err(EqualizeError::InvalidHistogramValue(i, bins[i])),
            None => Ok(Self(bins)),
        }
    }

    // bins may only be rewritten by operations that keep them finite and non-negative
    pub(crate) fn bins_mut(&mut self) -> &mut [f64; NUM_BINS] {
        &mut self.0
    }

    /// Iterate over the bins.
    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    /// Total mass of the histogram.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Whether the histogram has no mass at all.
    pub fn is_empty(&self) -> bool {
        self.total() == 0.0
    }

    /// Return the normalized histogram. See [`normalize_histogram`].
    pub fn normalized(mut self) -> Self {
        normalize_histogram(&mut self);
        self
    }

    /// Return the cumulative histogram. See [`accumulate_histogram`].
    pub fn accumulated(mut self) -> Self {
        accumulate_histogram(&mut self);
        self
    }
}

impl std::ops::Index<usize> for Histogram {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl TryFrom<[f64; NUM_BINS]> for Histogram {
    type Error = EqualizeError;

    fn try_from(bins: [f64; NUM_BINS]) -> Result<Self, Self::Error> {
        Self::from_bins(bins)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Histogram {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Histogram {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bins = Vec::<f64>::deserialize(deserializer)?;
        let bins: [f64; NUM_BINS] = bins.try_into().map_err(|v: Vec<f64>| {
            serde::de::Error::invalid_length(v.len(), &"a histogram with 256 bins")
        })?;
        Self::from_bins(bins).map_err(serde::de::Error::custom)
    }
}

fn count_chunk(mut counts: [usize; NUM_BINS], chunk: &[u8]) -> [usize; NUM_BINS] {
    for &px in chunk {
        counts[px as usize] += 1;
    }
    counts
}

fn merge_counts(mut a: [usize; NUM_BINS], b: [usize; NUM_BINS]) -> [usize; NUM_BINS] {
    a.iter_mut().zip(b.iter()).for_each(|(x, y)| *x += y);
    a
}

/// Compute the pixel intensity histogram of an image.
///
/// Bin `v` of the result holds the number of pixels whose value is exactly `v`,
/// so the histogram sums up to the number of pixels in the image. When the
/// strategy is parallel the image is split into chunks whose partial counts are
/// summed before returning.
///
/// # Arguments
///
/// * `src` - The input 8-bit single channel image.
/// * `strategy` - How to split the counting across threads.
///
/// # Errors
///
/// Returns an error if the execution strategy is invalid.
///
/// # Example
///
/// ```
/// use lumeq_image::{Image, ImageSize};
/// use lumeq_imgproc::histogram::compute_histogram;
/// use lumeq_imgproc::parallel::ExecutionStrategy;
///
/// let image = Image::<u8, 1>::new(
///   ImageSize {
///     width: 3,
///     height: 1,
///   },
///   vec![0, 7, 7],
/// ).unwrap();
///
/// let hist = compute_histogram(&image, ExecutionStrategy::Serial).unwrap();
/// assert_eq!(hist[0], 1.0);
/// assert_eq!(hist[7], 2.0);
/// assert_eq!(hist.total(), 3.0);
/// ```
pub fn compute_histogram(
    src: &Image<u8, 1>,
    strategy: ExecutionStrategy,
) -> Result<Histogram, EqualizeError> {
    let counts = parallel::fold_with(
        src.as_slice(),
        strategy,
        || [0usize; NUM_BINS],
        count_chunk,
        merge_counts,
    )?;

    Histogram::from_counts(&counts)
}

/// Compute a binned pixel intensity histogram of an image.
///
/// The 256 intensity levels are spread evenly over `num_bins` bins and the
/// counts are added to the values already in `hist`.
///
/// # Arguments
///
/// * `src` - The input image to compute the histogram.
/// * `hist` - The output histogram.
/// * `num_bins` - The number of bins to use for the histogram.
///
/// # Errors
///
/// Returns an error if the number of bins is invalid.
///
/// # Example
///
/// ```
/// use lumeq_image::{Image, ImageSize};
/// use lumeq_imgproc::histogram::compute_histogram_counts;
///
/// let image = Image::<u8, 1>::new(
///   ImageSize {
///     width: 3,
///     height: 3,
///   },
///   vec![0, 2, 4, 128, 130, 132, 254, 255, 255],
/// ).unwrap();
///
/// let mut histogram = vec![0; 3];
///
/// compute_histogram_counts(&image, &mut histogram, 3).unwrap();
/// assert_eq!(histogram, vec![3, 3, 3]);
/// ```
pub fn compute_histogram_counts(
    src: &Image<u8, 1>,
    hist: &mut [usize],
    num_bins: usize,
) -> Result<(), EqualizeError> {
    if num_bins == 0 || num_bins > NUM_BINS {
        return Err(EqualizeError::InvalidHistogramBins(num_bins));
    }

    if hist.len() != num_bins {
        return Err(EqualizeError::InvalidHistogramBins(hist.len()));
    }

    let counts = parallel::fold_with(
        src.as_slice(),
        ExecutionStrategy::ParallelElements,
        || [0usize; NUM_BINS],
        count_chunk,
        merge_counts,
    )?;

    for (level, &count) in counts.iter().enumerate() {
        hist[(level * num_bins) >> 8] += count;
    }

    Ok(())
}

/// Normalize a histogram so that its bins sum up to one.
///
/// Every bin is divided by the total mass of the histogram. A histogram
/// without mass is left unchanged.
///
/// # Example
///
/// ```
/// use lumeq_imgproc::histogram::{normalize_histogram, Histogram};
///
/// let mut counts = vec![0; 256];
/// counts[10] = 1;
/// counts[20] = 3;
/// let mut hist = Histogram::from_counts(&counts).unwrap();
///
/// normalize_histogram(&mut hist);
/// assert_eq!(hist[10], 0.25);
/// assert_eq!(hist[20], 0.75);
/// ```
pub fn normalize_histogram(hist: &mut Histogram) {
    let total = hist.total();
    if total == 0.0 {
        return;
    }
    hist.0.iter_mut().for_each(|bin| *bin /= total);
}

/// Accumulate a histogram in place into its cumulative form.
///
/// After the call bin `i` holds the sum of the original bins `0..=i`, so the
/// result is non-decreasing and its last bin equals the total input mass.
pub fn accumulate_histogram(hist: &mut Histogram) {
    let mut acc = 0.0;
    hist.0.iter_mut().for_each(|bin| {
        acc += *bin;
        *bin = acc;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lumeq_image::ImageSize;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_image(
        width: usize,
        height: usize,
        seed: u64,
    ) -> Result<Image<u8, 1>, EqualizeError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..width * height).map(|_| rng.random()).collect();
        Ok(Image::new(ImageSize { width, height }, data)?)
    }

    #[test]
    fn test_compute_histogram() -> Result<(), EqualizeError> {
        let image = Image::new(
            ImageSize {
                width: 3,
                height: 3,
            },
            vec![0, 2, 4, 128, 130, 132, 254, 255, 255],
        )?;

        let hist = compute_histogram(&image, ExecutionStrategy::Serial)?;
        assert_eq!(hist[0], 1.0);
        assert_eq!(hist[128], 1.0);
        assert_eq!(hist[255], 2.0);
        assert_eq!(hist[1], 0.0);
        assert_eq!(hist.total(), 9.0);

        Ok(())
    }

    #[test]
    fn test_compute_histogram_mass() -> Result<(), EqualizeError> {
        let image = random_image(123, 77, 42)?;
        let serial = compute_histogram(&image, ExecutionStrategy::Serial)?;
        assert_eq!(serial.total(), (123 * 77) as f64);

        for strategy in [
            ExecutionStrategy::ParallelElements,
            ExecutionStrategy::AutoRows(123),
            ExecutionStrategy::Fixed(3),
        ] {
            let hist = compute_histogram(&image, strategy)?;
            assert_eq!(hist, serial, "strategy {strategy:?}");
        }

        Ok(())
    }

    #[test]
    fn test_compute_histogram_empty() -> Result<(), EqualizeError> {
        let image = Image::<u8, 1>::new(
            ImageSize {
                width: 0,
                height: 4,
            },
            vec![],
        )?;
        let hist = compute_histogram(&image, ExecutionStrategy::ParallelElements)?;
        assert!(hist.is_empty());
        Ok(())
    }

    #[test]
    fn test_compute_histogram_counts() -> Result<(), EqualizeError> {
        let image = Image::new(
            ImageSize {
                width: 3,
                height: 3,
            },
            vec![0, 2, 4, 128, 130, 132, 254, 255, 255],
        )?;

        let mut histogram = vec![0; 3];
        compute_histogram_counts(&image, &mut histogram, 3)?;
        assert_eq!(histogram, vec![3, 3, 3]);

        let mut histogram = vec![0; 0];
        assert_eq!(
            compute_histogram_counts(&image, &mut histogram, 0),
            Err(EqualizeError::InvalidHistogramBins(0))
        );

        let mut histogram = vec![0; 4];
        assert_eq!(
            compute_histogram_counts(&image, &mut histogram, 3),
            Err(EqualizeError::InvalidHistogramBins(4))
        );

        Ok(())
    }

    #[test]
    fn test_from_counts_wrong_len() {
        assert_eq!(
            Histogram::from_counts(&[1, 2, 3]),
            Err(EqualizeError::InvalidHistogramBins(3))
        );
    }

    #[test]
    fn test_normalize_histogram() -> Result<(), EqualizeError> {
        let image = random_image(64, 48, 7)?;
        let mut hist = compute_histogram(&image, ExecutionStrategy::Serial)?;
        normalize_histogram(&mut hist);
        assert_abs_diff_eq!(hist.total(), 1.0, epsilon = 1e-6);

        // normalizing twice does not change the distribution
        let again = hist.normalized();
        for (a, b) in hist.iter().zip(again.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }

        Ok(())
    }

    #[test]
    fn test_normalize_empty_histogram() {
        let mut hist = Histogram::zeros();
        normalize_histogram(&mut hist);
        assert_eq!(hist, Histogram::zeros());
        assert_eq!(hist.total(), 0.0);
    }

    #[test]
    fn test_accumulate_histogram() -> Result<(), EqualizeError> {
        let image = random_image(50, 50, 3)?;
        let hist = compute_histogram(&image, ExecutionStrategy::Serial)?;
        let total = hist.total();

        let cdf = hist.accumulated();
        assert!(cdf.as_slice().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(cdf[255], total);
        assert_eq!(cdf[0], hist[0]);
        assert_eq!(cdf[1], hist[0] + hist[1]);

        Ok(())
    }

    #[test]
    fn test_normalized_cdf_ends_at_one() -> Result<(), EqualizeError> {
        let image = random_image(31, 17, 11)?;
        let cdf = compute_histogram(&image, ExecutionStrategy::Serial)?
            .normalized()
            .accumulated();
        assert_abs_diff_eq!(cdf[255], 1.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_from_bins() -> Result<(), EqualizeError> {
        let mut bins = [1.0; NUM_BINS];
        bins[7] = 0.5;
        let hist = Histogram::try_from(bins)?;
        assert_eq!(hist[7], 0.5);
        assert_eq!(hist.total(), 255.5);

        bins[100] = -50.0;
        assert_eq!(
            Histogram::from_bins(bins),
            Err(EqualizeError::InvalidHistogramValue(100, -50.0))
        );

        // bins that would cancel out to an empty total
        let mut bins = [0.0; NUM_BINS];
        bins[10] = 5.0;
        bins[20] = -5.0;
        assert_eq!(
            Histogram::from_bins(bins),
            Err(EqualizeError::InvalidHistogramValue(20, -5.0))
        );

        let mut bins = [0.0; NUM_BINS];
        bins[10] = f64::NAN;
        assert!(matches!(
            Histogram::from_bins(bins),
            Err(EqualizeError::InvalidHistogramValue(10, _))
        ));
        bins[10] = f64::INFINITY;
        assert!(Histogram::from_bins(bins).is_err());

        Ok(())
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_histogram_serde() -> Result<(), Box<dyn std::error::Error>> {
        let image = random_image(20, 10, 5)?;
        let hist = compute_histogram(&image, ExecutionStrategy::Serial)?;

        let json = serde_json::to_string(&hist)?;
        let back: Histogram = serde_json::from_str(&json)?;
        assert_eq!(back, hist);

        assert!(serde_json::from_str::<Histogram>("[1.0, 2.0, 3.0]").is_err());

        let mut bins = vec![1.0; NUM_BINS];
        bins[3] = -1.0;
        let json = serde_json::to_string(&bins)?;
        assert!(serde_json::from_str::<Histogram>(&json).is_err());

        Ok(())
    }
}
