// sequential.rs — single-threaded reference executor.
//
// The other two executors are validated against this one.

use tracing::debug;

use crate::convolution::{blur_rows, KernelWeights, GAUSSIAN_3X3};
use crate::error::Result;
use crate::executor::Executor;
use crate::grid::{PixelGrid, Rgb};

/// Blurs every row in one pass on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor {
    weights: KernelWeights,
}

impl SequentialExecutor {
    pub fn new() -> Self {
        SequentialExecutor { weights: GAUSSIAN_3X3 }
    }

    /// Blur `src` into a new grid of the same size.
    pub fn run(&self, src: &PixelGrid) -> PixelGrid {
        let (w, h) = (src.width(), src.height());
        debug!(width = w, height = h, "sequential blur");

        let mut out = vec![Rgb::BLACK; src.len()];
        blur_rows(src, &self.weights, 0..h, &mut out);
        PixelGrid::from_output(w, h, out)
    }
}

impl Executor for SequentialExecutor {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn execute(&self, src: &PixelGrid) -> Result<PixelGrid> {
        Ok(self.run(src))
    }
}
