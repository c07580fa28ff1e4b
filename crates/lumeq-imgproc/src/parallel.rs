use rayon::prelude::*;
use thiserror::Error;

/// Number of pixels handled by a single task when splitting a flat buffer.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Errors raised while setting up a parallel pass over an image buffer.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The local thread pool could not be created.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// A fixed pool needs at least one thread.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// Splitting by rows needs a non-zero row length.
    #[error("row stride must be > 0, got {0}")]
    InvalidRowStride(usize),
}

/// How the pixels of an image are split across threads.
///
/// Every strategy produces the same histogram and the same remapped pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionStrategy {
    /// Chunks of [`DEFAULT_CHUNK_SIZE`] pixels on the global Rayon pool.
    #[default]
    ParallelElements,

    /// One task per chunk of the given number of pixels, usually the image width.
    AutoRows(usize),

    /// Everything on the calling thread.
    Serial,

    /// Chunks of [`DEFAULT_CHUNK_SIZE`] pixels on a local pool of `n` threads.
    ///
    /// The pool is built on every call.
    Fixed(usize),
}

/// A validated strategy.
enum Plan {
    Serial,
    Chunks(usize),
    Pool(rayon::ThreadPool),
}

impl Plan {
    fn new(strategy: ExecutionStrategy) -> Result<Self, ParallelError> {
        match strategy {
            ExecutionStrategy::Serial => Ok(Plan::Serial),
            ExecutionStrategy::ParallelElements => Ok(Plan::Chunks(DEFAULT_CHUNK_SIZE)),
            ExecutionStrategy::AutoRows(0) => Err(ParallelError::InvalidRowStride(0)),
            ExecutionStrategy::AutoRows(stride) => Ok(Plan::Chunks(stride)),
            ExecutionStrategy::Fixed(0) => Err(ParallelError::InvalidThreadCount(0)),
            ExecutionStrategy::Fixed(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map(Plan::Pool)
                .map_err(|e| ParallelError::BuildError(e.to_string())),
        }
    }
}

/// Reduce a slice to a single value with the given strategy.
///
/// The slice is split into chunks, every chunk is folded into a partial result
/// starting from `identity()`, and the partial results are combined with `merge`.
/// With [`ExecutionStrategy::Serial`] the whole slice is folded as one chunk.
///
/// `merge` must be associative and `identity()` must be its neutral element,
/// otherwise the result depends on how the slice was split.
///
/// # Arguments
///
/// * `src` - The slice to reduce.
/// * `strategy` - The execution strategy.
/// * `identity` - Produces the initial value of every partial result.
/// * `fold` - Folds one chunk into a partial result.
/// * `merge` - Combines two partial results.
///
/// # Errors
///
/// Returns an error if the strategy parameters are invalid or the thread pool fails to build.
pub fn fold_with<T, R, ID, F, M>(
    src: &[T],
    strategy: ExecutionStrategy,
    identity: ID,
    fold: F,
    merge: M,
) -> Result<R, ParallelError>
where
    T: Sync,
    R: Send,
    ID: Fn() -> R + Sync + Send,
    F: Fn(R, &[T]) -> R + Sync + Send,
    M: Fn(R, R) -> R + Sync + Send,
{
    let par_fold = |chunk_size: usize| {
        src.par_chunks(chunk_size)
            .fold(&identity, &fold)
            .reduce(&identity, &merge)
    };

    Ok(match Plan::new(strategy)? {
        Plan::Serial => fold(identity(), src),
        Plan::Chunks(chunk_size) => par_fold(chunk_size),
        Plan::Pool(pool) => pool.install(|| par_fold(DEFAULT_CHUNK_SIZE)),
    })
}

/// Run `op` over matching chunks of a source and a destination buffer.
///
/// Both buffers are split at the same offsets, `op` receives each source chunk
/// together with the destination chunk at the same position. With
/// [`ExecutionStrategy::Serial`] `op` is called once on the whole buffers.
///
/// The caller checks that both buffers have the same length. Nothing is
/// written when the strategy is rejected.
///
/// # Errors
///
/// Returns an error if the strategy parameters are invalid or the thread pool fails to build.
pub fn zip_chunks_with<T, U, F>(
    src: &[T],
    dst: &mut [U],
    strategy: ExecutionStrategy,
    op: F,
) -> Result<(), ParallelError>
where
    T: Sync,
    U: Send,
    F: Fn(&[T], &mut [U]) + Sync + Send,
{
    let par_zip = |dst: &mut [U], chunk_size: usize| {
        src.par_chunks(chunk_size)
            .zip(dst.par_chunks_mut(chunk_size))
            .for_each(|(s, d)| op(s, d));
    };

    match Plan::new(strategy)? {
        Plan::Serial => op(src, dst),
        Plan::Chunks(chunk_size) => par_zip(dst, chunk_size),
        Plan::Pool(pool) => pool.install(|| par_zip(dst, DEFAULT_CHUNK_SIZE)),
    }
    Ok(())
}

/// Run `op` over the chunks of a buffer updated in place.
///
/// # Errors
///
/// Returns an error if the strategy parameters are invalid or the thread pool fails to build.
pub fn chunks_mut_with<T, F>(
    buf: &mut [T],
    strategy: ExecutionStrategy,
    op: F,
) -> Result<(), ParallelError>
where
    T: Send,
    F: Fn(&mut [T]) + Sync + Send,
{
    let par_each = |buf: &mut [T], chunk_size: usize| {
        buf.par_chunks_mut(chunk_size).for_each(&op);
    };

    match Plan::new(strategy)? {
        Plan::Serial => op(buf),
        Plan::Chunks(chunk_size) => par_each(buf, chunk_size),
        Plan::Pool(pool) => pool.install(|| par_each(buf, DEFAULT_CHUNK_SIZE)),
    }
    Ok(())
}
