// gpu/device.rs — acquiring a wgpu compute device.
//
// Responsibilities:
//   - Enumerate adapters for the requested backends and pick the best one.
//   - Request a device with the adapter's own limits, so large images are
//     not capped by wgpu's conservative defaults.
//   - Hold `WorkgroupSize`, validated against those limits, and turn image
//     sizes into dispatch sizes.
//
// ADAPTER SELECTION:
// wgpu's `request_adapter` heuristics may hand back llvmpipe/lavapipe even
// when a real GPU exists. We enumerate explicitly and rank:
//
//   DiscreteGpu / IntegratedGpu   real hardware          <- preferred
//   VirtualGpu / Other            VM pass-through, dzn   <- acceptable
//   Cpu                           software rasterizer    <- only if allowed
//
// LIFETIME:
// A `GpuDevice` owns the instance, device and queue. Dropping it releases
// them. `DeviceExecutor` acquires one per call and drops it before
// returning, on success and on every error path.

use std::fmt;

use tracing::{debug, info};

use crate::error::{BlurError, Result};

/// A 2D compute workgroup size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Check this size against a device's compute limits.
    ///
    /// # Errors
    /// `InvalidInput` if a dimension is zero or any limit is exceeded.
    pub fn validate(&self, limits: &wgpu::Limits) -> Result<()> {
        if self.x == 0 || self.y == 0 {
            return Err(BlurError::invalid_input(format!("workgroup {self} has a zero dimension")));
        }
        if self.x > limits.max_compute_workgroup_size_x
            || self.y > limits.max_compute_workgroup_size_y
        {
            return Err(BlurError::invalid_input(format!(
                "workgroup {self} exceeds per-dimension limit {}×{}",
                limits.max_compute_workgroup_size_x, limits.max_compute_workgroup_size_y
            )));
        }
        match self.x.checked_mul(self.y) {
            Some(total) if total <= limits.max_compute_invocations_per_workgroup => Ok(()),
            _ => Err(BlurError::invalid_input(format!(
                "workgroup {self} exceeds limit of {} invocations",
                limits.max_compute_invocations_per_workgroup
            ))),
        }
    }

    /// Workgroups needed to cover a `width × height` index space. Uses
    /// ceiling division, so the shader must guard against out-of-range ids.
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(self.x), height.div_ceil(self.y))
    }
}

impl Default for WorkgroupSize {
    /// 16×8 = 128 invocations: four 32-wide warps on NVIDIA, two 64-wide
    /// wavefronts on AMD, well under every adapter's minimum limit of 256.
    fn default() -> Self {
        WorkgroupSize { x: 16, y: 8 }
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.x, self.y)
    }
}

/// How to acquire the compute backend.
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Backends to enumerate. Default: Vulkan, Metal, DX12.
    pub backends: wgpu::Backends,
    /// Accept a CPU (software) adapter when no hardware adapter exists.
    pub allow_software_adapter: bool,
    pub workgroup: WorkgroupSize,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            backends: wgpu::Backends::PRIMARY,
            allow_software_adapter: true,
            workgroup: WorkgroupSize::default(),
        }
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// An acquired compute context: device, queue and the adapter they came from.
///
/// # Field drop order
/// Fields drop top to bottom. `_instance` is last so the `wgpu::Instance`
/// outlives `device` and `queue`; some Vulkan layers (dzn on WSL2) crash if
/// the instance goes first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub workgroup: WorkgroupSize,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Acquire a device, blocking the calling thread.
    ///
    /// # Errors
    /// `BackendUnavailable` if no acceptable adapter exists or the device
    /// request fails; `InvalidInput` if the workgroup size does not fit the
    /// device.
    pub fn acquire(options: &DeviceOptions) -> Result<Self> {
        pollster::block_on(Self::acquire_async(options))
    }

    pub async fn acquire_async(options: &DeviceOptions) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: options.backends,
            flags: wgpu::InstanceFlags::from_build_config(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(options.backends);
        for a in &adapters {
            let info = a.get_info();
            debug!(name = %info.name, backend = ?info.backend, device_type = ?info.device_type, "found adapter");
        }

        let adapter = select_adapter(adapters, options.allow_software_adapter).ok_or_else(|| {
            BlurError::BackendUnavailable {
                reason: format!(
                    "no {} adapter for backends {:?}",
                    if options.allow_software_adapter { "compute" } else { "hardware" },
                    options.backends
                ),
            }
        })?;

        let raw = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw.name,
            device_type: raw.device_type,
            backend: raw.backend,
        };

        let limits = adapter.limits();
        options.workgroup.validate(&limits)?;

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gaussblur"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| BlurError::BackendUnavailable {
                reason: format!("device request on {adapter_info} failed: {e}"),
            })?;

        // Errors outside an error scope would otherwise hit wgpu's default
        // handler, which panics. Every operation we care about runs inside
        // a scope, so anything landing here is only logged.
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| {
            tracing::error!(error = %e, "uncaptured wgpu error");
        }));

        info!(adapter = %adapter_info, workgroup = %options.workgroup, "acquired compute device");

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            workgroup: options.workgroup,
            _instance: instance,
        })
    }

    /// Workgroups needed to cover a `width × height` index space.
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        self.workgroup.dispatch_size(width, height)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuDevice {{ adapter: {}, workgroup: {} }}", self.adapter_info, self.workgroup)
    }
}

/// Rank of an adapter type; lower is better, `None` means never pick it.
fn adapter_rank(device_type: wgpu::DeviceType, allow_software: bool) -> Option<u8> {
    match device_type {
        wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu => Some(0),
        wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other => Some(1),
        wgpu::DeviceType::Cpu if allow_software => Some(2),
        wgpu::DeviceType::Cpu => None,
    }
}

fn select_adapter(adapters: Vec<wgpu::Adapter>, allow_software: bool) -> Option<wgpu::Adapter> {
    adapters
        .into_iter()
        .filter_map(|a| adapter_rank(a.get_info().device_type, allow_software).map(|r| (r, a)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, a)| a)
}
