//! Contrast limiting for histogram equalization.
//!
//! The slope of the equalization curve at intensity `v` is proportional to the
//! height of histogram bin `v`. Capping the bins at a clip level, and spreading
//! the removed mass evenly over all the bins, bounds how much the contrast of
//! any intensity range can be amplified.
//!
//! The clip level is driven by a [`ClipFactor`] `s`: the number of times the
//! mean bin count a bin may hold. Factors below `1.0` disable clipping.
//!
//! # Example
//!
//! ```
//! use lumeq_imgproc::clip::{clip_histogram, compute_clip_level, ClipFactor};
//! use lumeq_imgproc::histogram::Histogram;
//!
//! let mut counts = vec![1; 256];
//! counts[128] = 1000;
//! let mut hist = Histogram::from_counts(&counts).unwrap();
//! let total = hist.total();
//!
//! let cl = compute_clip_level(&hist, ClipFactor::new(2.0).unwrap());
//! clip_histogram(&mut hist, cl);
//!
//! assert!(hist[128] < 1000.0);
//! assert!((hist.total() - total).abs() < 1e-6);
//! ```

use log::debug;

use crate::error::EqualizeError;
use crate::histogram::{Histogram, NUM_BINS};

/// Upper bound on the bisection steps of [`search_clip_level`].
pub const MAX_SEARCH_ITERATIONS: usize = 64;

/// Multiple of the mean bin count used as clip level baseline.
///
/// A factor below `1.0` disables clipping.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "f64", into = "f64")
)]
pub struct ClipFactor(f64);

impl ClipFactor {
    /// A clip factor that disables clipping.
    pub const DISABLED: ClipFactor = ClipFactor(0.0);

    /// Create a new clip factor.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is negative, NaN or infinite.
    pub fn new(s: f64) -> Result<Self, EqualizeError> {
        if !s.is_finite() || s < 0.0 {
            return Err(EqualizeError::InvalidClipFactor(s));
        }
        Ok(Self(s))
    }

    /// Get the raw factor.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether the factor enables clipping.
    pub fn is_enabled(&self) -> bool {
        self.0 >= 1.0
    }
}

impl TryFrom<f64> for ClipFactor {
    type Error = EqualizeError;

    fn try_from(s: f64) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ClipFactor> for f64 {
    fn from(s: ClipFactor) -> Self {
        s.0
    }
}

impl std::fmt::Display for ClipFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of the clip level bisection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipLevelSearch {
    /// The clip level ceiling `s * total / 256`. This is the level to clip at.
    pub target: f64,
    /// Lower end of the final bracket.
    pub low: f64,
    /// Upper end of the final bracket.
    pub high: f64,
    /// Number of bisection steps performed.
    pub iterations: usize,
}

/// Run the clip level bisection on a raw histogram.
///
/// Starting from the bracket `[0, target]` with `target = s * total / 256`,
/// the bracket is halved while it is wider than one count. At each step the
/// excess `R` of the histogram above the midpoint is compared to the room left
/// between the midpoint and the target over all the bins: if `R` exceeds it the
/// upper end moves down, otherwise the lower end moves up.
///
/// The bisection only narrows the bracket; the level to clip at is always
/// [`ClipLevelSearch::target`].
///
/// # Arguments
///
/// * `hist` - The raw (not normalized) histogram.
/// * `s` - The clip factor.
pub fn search_clip_level(hist: &Histogram, s: ClipFactor) -> ClipLevelSearch {
    let num_bins = NUM_BINS as f64;
    let target = s.value() * hist.total() / num_bins;

    let mut low = 0.0;
    let mut high = target;
    let mut iterations = 0;

    while high - low > 1.0 && iterations < MAX_SEARCH_ITERATIONS {
        let mid = (low + high) / 2.0;
        let excess: f64 = hist.iter().map(|&h| (h - mid).max(0.0)).sum();

        if excess > (target - mid) * num_bins {
            high = mid;
        } else {
            low = mid;
        }
        iterations += 1;
    }

    debug!(
        "clip level search: s={} target={} bracket=[{}, {}] iterations={}",
        s, target, low, high, iterations
    );

    ClipLevelSearch {
        target,
        low,
        high,
        iterations,
    }
}

/// Compute the clip level of a raw histogram for a given clip factor.
///
/// The returned level lies in `[0, s * total / 256]`. See [`search_clip_level`].
pub fn compute_clip_level(hist: &Histogram, s: ClipFactor) -> f64 {
    search_clip_level(hist, s).target
}

/// Clip a histogram at `cl` and redistribute the excess uniformly.
///
/// Every bin is capped at `cl` and the total mass removed is spread evenly over
/// all the 256 bins, so the total mass of the histogram is preserved. Negative
/// levels are treated as zero.
pub fn clip_histogram(hist: &mut Histogram, cl: f64) {
    let cl = cl.max(0.0);

    let mut excess = 0.0;
    hist.bins_mut().iter_mut().for_each(|bin| {
        if *bin > cl {
            excess += *bin - cl;
            *bin = cl;
        }
    });

    let share = excess / NUM_BINS as f64;
    hist.bins_mut().iter_mut().for_each(|bin| *bin += share);
}

impl Histogram {
    /// Return the histogram clipped at `cl`. See [`clip_histogram`].
    pub fn clipped(mut self, cl: f64) -> Self {
        clip_histogram(&mut self, cl);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn peaked_histogram() -> Result<Histogram, EqualizeError> {
        let mut counts = vec![10; NUM_BINS];
        counts[50] = 5000;
        counts[200] = 20000;
        Histogram::from_counts(&counts)
    }

    #[test]
    fn test_clip_factor() -> Result<(), EqualizeError> {
        assert!(!ClipFactor::DISABLED.is_enabled());
        assert!(!ClipFactor::new(0.99)?.is_enabled());
        assert!(ClipFactor::new(1.0)?.is_enabled());
        assert_eq!(ClipFactor::default(), ClipFactor::DISABLED);
        assert_eq!(
            ClipFactor::new(-1.0),
            Err(EqualizeError::InvalidClipFactor(-1.0))
        );
        assert!(ClipFactor::new(f64::NAN).is_err());
        assert!(ClipFactor::try_from(f64::INFINITY).is_err());
        assert_eq!(f64::from(ClipFactor::new(3.5)?), 3.5);
        Ok(())
    }

    #[test]
    fn test_search_clip_level() -> Result<(), EqualizeError> {
        let hist = peaked_histogram()?;
        let s = ClipFactor::new(4.0)?;
        let search = search_clip_level(&hist, s);

        let target = 4.0 * hist.total() / 256.0;
        assert_relative_eq!(search.target, target);
        assert!(search.iterations > 0);
        assert!(search.iterations <= MAX_SEARCH_ITERATIONS);
        assert!(search.high - search.low <= 1.0);
        assert!(0.0 <= search.low && search.low <= search.high);
        assert!(search.high <= target);

        // the level applied is the target, not the converged bracket
        assert_eq!(compute_clip_level(&hist, s), target);

        Ok(())
    }

    #[test]
    fn test_search_narrow_bracket() -> Result<(), EqualizeError> {
        // 16 samples: the target is far below one count, the loop never runs
        let mut counts = vec![0; NUM_BINS];
        counts[0] = 4;
        counts[85] = 4;
        counts[170] = 4;
        counts[255] = 4;
        let hist = Histogram::from_counts(&counts)?;

        let search = search_clip_level(&hist, ClipFactor::new(1.0)?);
        assert_eq!(search.iterations, 0);
        assert_eq!(search.target, 16.0 / 256.0);
        assert_eq!(search.low, 0.0);
        assert_eq!(search.high, search.target);

        Ok(())
    }

    #[test]
    fn test_search_empty_histogram() -> Result<(), EqualizeError> {
        let hist = Histogram::zeros();
        let search = search_clip_level(&hist, ClipFactor::new(8.0)?);
        assert_eq!(search.target, 0.0);
        assert_eq!(search.iterations, 0);
        Ok(())
    }

    #[test]
    fn test_search_terminates_on_random_histograms() -> Result<(), EqualizeError> {
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..50 {
            let counts = (0..NUM_BINS)
                .map(|_| rng.random_range(0..1_000_000usize))
                .collect::<Vec<_>>();
            let hist = Histogram::from_counts(&counts)?;
            let s = ClipFactor::new(rng.random_range(1.0..100.0))?;

            let search = search_clip_level(&hist, s);
            let bound = s.value() * hist.total() / 256.0;
            assert!(search.iterations <= MAX_SEARCH_ITERATIONS);
            assert!(search.target >= 0.0 && search.target <= bound);
        }
        Ok(())
    }

    #[test]
    fn test_clip_histogram() -> Result<(), EqualizeError> {
        let mut counts = vec![0; NUM_BINS];
        counts[0] = 256 + 100;
        counts[1] = 50;
        let mut hist = Histogram::from_counts(&counts)?;

        clip_histogram(&mut hist, 100.0);

        // 256 excess counts spread over 256 bins
        assert_relative_eq!(hist[0], 101.0);
        assert_relative_eq!(hist[1], 51.0);
        assert_relative_eq!(hist[2], 1.0);
        assert_relative_eq!(hist.total(), 406.0);

        Ok(())
    }

    #[test]
    fn test_clip_histogram_preserves_mass() -> Result<(), EqualizeError> {
        let hist = peaked_histogram()?;
        let total = hist.total();

        for cl in [0.0, 0.5, 10.0, 137.25, 5000.0, 1e9] {
            let clipped = hist.clipped(cl);
            assert_relative_eq!(clipped.total(), total, max_relative = 1e-4);
            assert!(clipped.iter().all(|&h| h >= 0.0));
        }

        // a negative level behaves as zero: a flat histogram
        let flat = hist.clipped(-5.0);
        assert_relative_eq!(flat[0], total / 256.0);
        assert_relative_eq!(flat[200], total / 256.0);

        Ok(())
    }

    #[test]
    fn test_clip_above_max_is_noop() -> Result<(), EqualizeError> {
        let hist = peaked_histogram()?;
        assert_eq!(hist.clipped(20000.0), hist);
        Ok(())
    }
}
