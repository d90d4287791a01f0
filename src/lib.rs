// gaussblur: 3×3 Gaussian blur over RGB pixel grids
//
// Three interchangeable executors over one kernel:
//   SequentialExecutor  — single thread, the reference result
//   PartitionedExecutor — horizontal row bands on scoped worker threads
//   DeviceExecutor      — wgpu compute kernel, within 1 of the reference

pub mod config;
pub mod convolution;
pub mod error;
pub mod executor;
pub mod gpu;
pub mod grid;
pub mod partition;
pub mod sequential;

pub use config::{BlurConfig, StrategyKind};
pub use convolution::{KernelWeights, GAUSSIAN_3X3};
pub use error::{BlurError, Result};
pub use executor::{blur, Executor, Strategy};
pub use gpu::blur::DeviceExecutor;
pub use gpu::device::{DeviceOptions, GpuDevice, WorkgroupSize};
pub use grid::{PixelGrid, Rgb};
pub use partition::{Band, PartitionedExecutor};
pub use sequential::SequentialExecutor;
