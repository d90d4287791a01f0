// executor.rs — the common "apply convolution" capability.
//
// Each executor is its own type. `Strategy` is the sum type a caller picks
// from at run time; it forwards to exactly one executor per call and never
// substitutes another one on failure.

use crate::error::Result;
use crate::gpu::blur::DeviceExecutor;
use crate::grid::PixelGrid;
use crate::partition::PartitionedExecutor;
use crate::sequential::SequentialExecutor;

/// Blur a grid into a new grid of identical dimensions.
///
/// Implementations copy border pixels unchanged and convolve every interior
/// pixel with [`GAUSSIAN_3X3`](crate::convolution::GAUSSIAN_3X3).
pub trait Executor {
    /// Short lowercase name, used in logs and benches.
    fn name(&self) -> &'static str;

    fn execute(&self, src: &PixelGrid) -> Result<PixelGrid>;
}

/// Which executor to run.
#[derive(Debug, Clone)]
pub enum Strategy {
    Sequential(SequentialExecutor),
    Partitioned(PartitionedExecutor),
    Device(DeviceExecutor),
}

impl Strategy {
    pub fn sequential() -> Self {
        Strategy::Sequential(SequentialExecutor::new())
    }

    /// Partitioned across `workers` threads.
    pub fn partitioned(workers: usize) -> Result<Self> {
        PartitionedExecutor::new(workers).map(Strategy::Partitioned)
    }

    pub fn device() -> Self {
        Strategy::Device(DeviceExecutor::default())
    }

    fn as_executor(&self) -> &dyn Executor {
        match self {
            Strategy::Sequential(e) => e,
            Strategy::Partitioned(e) => e,
            Strategy::Device(e) => e,
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Partitioned(PartitionedExecutor::default())
    }
}

impl Executor for Strategy {
    fn name(&self) -> &'static str {
        self.as_executor().name()
    }

    fn execute(&self, src: &PixelGrid) -> Result<PixelGrid> {
        self.as_executor().execute(src)
    }
}

/// Blur `src` with the chosen strategy.
pub fn blur(src: &PixelGrid, strategy: &Strategy) -> Result<PixelGrid> {
    strategy.execute(src)
}
