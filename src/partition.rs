// partition.rs — row-band parallel executor.
//
// SPLITTING RULE
// ──────────────
// For N workers and height H, band i covers rows
//
//   [i * ⌊H/N⌋, (i + 1) * ⌊H/N⌋)      for i < N - 1
//   [(N - 1) * ⌊H/N⌋, H)              for the last band
//
// so the last band absorbs the remainder. When N > H, ⌊H/N⌋ = 0: the first
// N - 1 bands are empty and the last band covers the whole image.
//
// Band edges are only a way to split work. A worker reads the rows just
// above and below its band straight from the shared input grid; only rows 0
// and H - 1 are real borders.
//
// SYNCHRONISATION
// ───────────────
// The output buffer is cut into one `&mut [Rgb]` block per band with
// `split_at_mut`, so the borrow checker proves the writes are disjoint and
// no lock is needed. The input is shared as `&PixelGrid` (read-only, `Sync`).
// Workers run inside `std::thread::scope`; every handle is joined before the
// scope closes, and the output grid is only built after that, so a caller
// never sees a partially written result.

use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::thread;

use tracing::{debug, warn};

use crate::convolution::{blur_rows, KernelWeights, GAUSSIAN_3X3};
use crate::error::{BlurError, Result};
use crate::executor::Executor;
use crate::grid::{PixelGrid, Rgb};

// ---------------------------------------------------------------------------
// Band
// ---------------------------------------------------------------------------

/// A contiguous block of rows handed to one worker: `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// Worker index, `0..N`.
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Band {
    #[inline]
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The rows of this band that get convolved in an image of `height`
    /// rows, i.e. the band minus the global top and bottom border.
    pub fn interior_rows(&self, height: usize) -> Range<usize> {
        let lo = self.start.max(1);
        let hi = self.end.min(height.saturating_sub(1));
        lo..hi.max(lo)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{} (band {})", self.start, self.end, self.index)
    }
}

/// Split `height` rows into `workers` contiguous bands.
///
/// The bands are returned in order, cover `0..height` exactly once, and
/// the last one absorbs the remainder.
///
/// # Panics
/// Panics if `workers == 0`.
pub fn split_rows(height: usize, workers: usize) -> Vec<Band> {
    assert!(workers > 0, "need at least one worker");
    let step = height / workers;
    (0..workers)
        .map(|index| Band {
            index,
            start: step * index,
            end: if index + 1 == workers { height } else { step * (index + 1) },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// PartitionedExecutor
// ---------------------------------------------------------------------------

/// Blurs an image with a fixed number of scoped worker threads, one per
/// row band.
#[derive(Debug, Clone, Copy)]
pub struct PartitionedExecutor {
    workers: NonZeroUsize,
    weights: KernelWeights,
}

impl PartitionedExecutor {
    /// An executor with `workers` threads.
    ///
    /// # Errors
    /// `InvalidInput` if `workers == 0`.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = NonZeroUsize::new(workers)
            .ok_or_else(|| BlurError::invalid_input("worker count must be at least 1"))?;
        Ok(Self::with_workers(workers))
    }

    pub fn with_workers(workers: NonZeroUsize) -> Self {
        PartitionedExecutor { workers, weights: GAUSSIAN_3X3 }
    }

    /// One worker per available execution unit on this host.
    pub fn with_available_parallelism() -> Self {
        Self::with_workers(default_workers())
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Blur `src` into a new grid, blocking until every band is done.
    ///
    /// # Errors
    /// `WorkerFailure` if any worker panicked or could not be spawned.
    pub fn run(&self, src: &PixelGrid) -> Result<PixelGrid> {
        let weights = self.weights;
        self.run_bands(src, move |src, band, block| {
            blur_rows(src, &weights, band.rows(), block)
        })
    }

    /// Run `work` once per non-empty band, each on its own thread, with the
    /// band's slice of the output buffer.
    fn run_bands<F>(&self, src: &PixelGrid, work: F) -> Result<PixelGrid>
    where
        F: Fn(&PixelGrid, Band, &mut [Rgb]) + Sync,
    {
        let (w, h) = (src.width(), src.height());
        let bands = split_rows(h, self.workers.get());
        let mut out = vec![Rgb::BLACK; src.len()];

        let failure = thread::scope(|s| {
            let work = &work;
            let mut rest: &mut [Rgb] = &mut out;
            let mut handles = Vec::with_capacity(bands.len());
            let mut failure: Option<BlurError> = None;

            for &band in &bands {
                let (block, tail) = std::mem::take(&mut rest).split_at_mut(band.len() * w);
                rest = tail;
                if band.is_empty() {
                    continue;
                }
                debug!(
                    band = band.index,
                    rows = ?band.rows(),
                    interior = band.interior_rows(h).len(),
                    "dispatching band"
                );
                let spawned = thread::Builder::new()
                    .name(format!("gaussblur-band-{}", band.index))
                    .spawn_scoped(s, move || work(src, band, block));
                match spawned {
                    Ok(handle) => handles.push((band, handle)),
                    Err(e) => {
                        warn!(band = band.index, error = %e, "could not spawn band worker");
                        failure.get_or_insert(BlurError::WorkerFailure {
                            band,
                            reason: format!("spawn failed: {e}"),
                        });
                    }
                }
            }

            // Join everything, even after a failure, so no worker outlives
            // this call.
            for (band, handle) in handles {
                if let Err(payload) = handle.join() {
                    let reason = panic_message(payload.as_ref());
                    warn!(band = band.index, %reason, "band worker panicked");
                    failure.get_or_insert(BlurError::WorkerFailure { band, reason });
                }
            }
            failure
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(PixelGrid::from_output(w, h, out)),
        }
    }
}

impl Default for PartitionedExecutor {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

impl Executor for PartitionedExecutor {
    fn name(&self) -> &'static str {
        "partitioned"
    }

    fn execute(&self, src: &PixelGrid) -> Result<PixelGrid> {
        self.run(src)
    }
}

/// Number of available execution units, or 1 if the host will not say.
pub fn default_workers() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequential::SequentialExecutor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gradient(w: usize, h: usize) -> PixelGrid {
        PixelGrid::from_fn(w, h, |x, y| {
            Rgb::new((x * 13 + y * 7) as u8, (x * y) as u8, (255 - x * 3) as u8)
        })
        .unwrap()
    }

    #[test]
    fn test_split_even() {
        let bands = split_rows(12, 3);
        assert_eq!(bands.iter().map(Band::rows).collect::<Vec<_>>(), vec![0..4, 4..8, 8..12]);
    }

    #[test]
    fn test_split_last_band_absorbs_remainder() {
        let bands = split_rows(10, 3);
        assert_eq!(bands.iter().map(Band::rows).collect::<Vec<_>>(), vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn test_split_more_workers_than_rows() {
        let bands = split_rows(3, 5);
        assert_eq!(bands.len(), 5);
        assert!(bands[..4].iter().all(Band::is_empty));
        assert_eq!(bands[4].rows(), 0..3);
    }

    #[test]
    fn test_split_covers_every_row_once() {
        for h in 1..=40 {
            for n in 1..=h {
                let bands = split_rows(h, n);
                let mut hits = vec![0u32; h];
                for b in &bands {
                    for y in b.rows() {
                        hits[y] += 1;
                    }
                }
                assert!(hits.iter().all(|&c| c == 1), "h={h} n={n}: {hits:?}");
                assert_eq!(bands.first().map(|b| b.start), Some(0));
                assert_eq!(bands.last().map(|b| b.end), Some(h));
            }
        }
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_split_zero_workers_panics() {
        split_rows(4, 0);
    }

    #[test]
    fn test_interior_rows() {
        let b = Band { index: 0, start: 0, end: 4 };
        assert_eq!(b.interior_rows(10), 1..4);
        let b = Band { index: 2, start: 6, end: 10 };
        assert_eq!(b.interior_rows(10), 6..9);
        let b = Band { index: 0, start: 0, end: 2 };
        assert!(b.interior_rows(2).is_empty());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(PartitionedExecutor::new(0), Err(BlurError::InvalidInput { .. })));
    }

    #[test]
    fn test_matches_sequential_for_many_worker_counts() {
        let src = gradient(23, 17);
        let reference = SequentialExecutor::new().run(&src);
        for n in 1..=20 {
            let out = PartitionedExecutor::new(n).unwrap().run(&src).unwrap();
            assert_eq!(out, reference, "mismatch with {n} workers");
        }
    }

    #[test]
    fn test_no_interior_rows() {
        let src = gradient(9, 2);
        let out = PartitionedExecutor::new(4).unwrap().run(&src).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_worker_panic_reported_after_all_join() {
        let src = gradient(8, 16);
        let exec = PartitionedExecutor::new(4).unwrap();
        let finished = AtomicUsize::new(0);
        let err = exec
            .run_bands(&src, |src, band, block| {
                if band.index == 1 {
                    panic!("band one exploded");
                }
                blur_rows(src, &GAUSSIAN_3X3, band.rows(), block);
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();

        match err {
            BlurError::WorkerFailure { band, reason } => {
                assert_eq!(band.index, 1);
                assert_eq!(band.rows(), 4..8);
                assert!(reason.contains("exploded"), "reason: {reason}");
            }
            other => panic!("expected WorkerFailure, got {other:?}"),
        }
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_default_uses_available_parallelism() {
        let exec = PartitionedExecutor::default();
        assert_eq!(exec.workers(), default_workers().get());
    }
}
