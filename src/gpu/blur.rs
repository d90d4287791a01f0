// gpu/blur.rs — device executor: 3×3 Gaussian blur as a wgpu compute kernel.
//
// DATA LAYOUT
// ───────────
// Host side the grid is flattened to `W * H * 3` bytes, `[r, g, b, ...]`
// (`PixelGrid::as_bytes`). WGSL storage buffers have no 8-bit type, and
// byte-granular writes from neighbouring invocations would race on the same
// 32-bit word, so each pixel is widened to one word before upload:
//
//   bytes:  r0 g0 b0 r1 g1 b1 ...   →   words: 0x00b0g0r0, 0x00b1g1r1, ...
//
// and narrowed back after readback.
//
// ONE CALL, ONE SCOPE
// ───────────────────
// `DeviceExecutor::execute` acquires a `GpuDevice`, builds the pipeline,
// buffers and bind group, dispatches, reads back, and returns. Every wgpu
// object is a local owned by that call, so all of them are released when it
// returns, whether it returns `Ok` or `Err`. There is no state carried
// between calls. Callers that blur many images with one device use
// `run_on` with a device they own.
//
// ERROR MAPPING
// ─────────────
//   adapter / device request fails           → BackendUnavailable
//   shader or pipeline validation error      → KernelBuildFailure
//   out-of-memory creating buffers, or the
//   image exceeds buffer / dispatch limits   → DeviceMemoryError
//   dispatch rejected, map or readback fails → TransferFailure
//
// wgpu reports validation and OOM errors asynchronously; we catch them with
// `push_error_scope` / `pop_error_scope` around each phase.

use std::sync::mpsc;

use tracing::debug;
use wgpu::util::DeviceExt;

use crate::convolution::{KernelWeights, GAUSSIAN_3X3};
use crate::error::{BlurError, Result};
use crate::executor::Executor;
use crate::gpu::device::{DeviceOptions, GpuDevice};
use crate::grid::{PixelGrid, Rgb};

const SHADER_TEMPLATE: &str = include_str!("../shaders/blur.wgsl");
const ENTRY_POINT: &str = "gaussian_blur";

// ---------------------------------------------------------------------------
// Kernel params uniform (must match WGSL struct layout exactly)
// ---------------------------------------------------------------------------

/// Layout of `BlurParams` in `blur.wgsl`:
///   offset  0: width   (u32)
///   offset  4: height  (u32)
///   offset  8: _pad    (2 × u32)
///   offset 16: weights (3 × vec4<f32>, one kernel row each, lane 3 unused)
///   total:  64 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurParams {
    width: u32,
    height: u32,
    _pad: [u32; 2],
    weights: [[f32; 4]; 3],
}

impl BlurParams {
    fn new(width: u32, height: u32, kernel: &KernelWeights) -> Self {
        let mut weights = [[0.0f32; 4]; 3];
        for (dst, src) in weights.iter_mut().zip(kernel.rows()) {
            dst[..3].copy_from_slice(src);
        }
        BlurParams { width, height, _pad: [0; 2], weights }
    }
}

// ---------------------------------------------------------------------------
// Host ↔ device marshaling
// ---------------------------------------------------------------------------

/// Widen a packed `[r, g, b, ...]` byte buffer to one `0x00BBGGRR` word per
/// pixel.
///
/// # Panics
/// Panics if `bytes.len()` is not a multiple of 3.
pub fn pack_rgb_words(bytes: &[u8]) -> Vec<u32> {
    assert!(bytes.len() % 3 == 0, "RGB buffer length {} is not a multiple of 3", bytes.len());
    bytes
        .chunks_exact(3)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], 0]))
        .collect()
}

/// Narrow device words back to pixels. The top byte of each word is ignored.
pub fn unpack_rgb_words(words: &[u32]) -> Vec<Rgb> {
    words
        .iter()
        .map(|w| {
            let [r, g, b, _] = w.to_le_bytes();
            Rgb::new(r, g, b)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// DeviceExecutor
// ---------------------------------------------------------------------------

/// Runs the blur on a compute device acquired for the duration of one call.
///
/// Results may differ from the CPU executors by at most 1 per channel on
/// interior pixels; borders are copied exactly. Failures are returned to the
/// caller; there is no fallback to a CPU executor.
#[derive(Debug, Clone)]
pub struct DeviceExecutor {
    options: DeviceOptions,
    weights: KernelWeights,
}

impl DeviceExecutor {
    pub fn new(options: DeviceOptions) -> Self {
        DeviceExecutor { options, weights: GAUSSIAN_3X3 }
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    /// Acquire a device, blur `src` on it, release everything.
    pub fn run(&self, src: &PixelGrid) -> Result<PixelGrid> {
        let gpu = GpuDevice::acquire(&self.options)?;
        let out = self.run_on(&gpu, src);
        drop(gpu);
        out
    }

    /// Blur `src` on a device the caller already holds. Every buffer and
    /// pipeline created here is dropped before returning.
    pub fn run_on(&self, gpu: &GpuDevice, src: &PixelGrid) -> Result<PixelGrid> {
        pollster::block_on(self.run_async(gpu, src))
    }

    async fn run_async(&self, gpu: &GpuDevice, src: &PixelGrid) -> Result<PixelGrid> {
        let (width, height) = device_dims(src)?;
        let limits = gpu.device.limits();
        let byte_len = check_buffer_fits(src.len(), &limits)?;
        let (wg_x, wg_y) = gpu.dispatch_size(width, height);
        let max_groups = limits.max_compute_workgroups_per_dimension;
        if wg_x > max_groups || wg_y > max_groups {
            return Err(BlurError::DeviceMemoryError {
                reason: format!(
                    "{width}×{height} needs {wg_x}×{wg_y} workgroups, device allows {max_groups} per dimension"
                ),
            });
        }

        // --- Compile kernel ---
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader_src = SHADER_TEMPLATE
            .replace("{{WG_X}}", &gpu.workgroup.x.to_string())
            .replace("{{WG_Y}}", &gpu.workgroup.y.to_string());
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blur.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });
        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GpuBlur BGL"),
            entries: &[
                // 0 — source pixels (storage read)
                storage_entry(0, true),
                // 1 — destination pixels (storage read_write)
                storage_entry(1, false),
                // 2 — params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GpuBlur pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(ENTRY_POINT),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: ENTRY_POINT,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        if let Some(e) = gpu.device.pop_error_scope().await {
            return Err(BlurError::KernelBuildFailure { reason: e.to_string() });
        }

        // --- Upload ---
        let words = pack_rgb_words(src.as_bytes());
        let params = BlurParams::new(width, height, &self.weights);

        gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let src_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GpuBlur src"),
            contents: bytemuck::cast_slice(&words),
            usage: wgpu::BufferUsages::STORAGE,
        });
        // Initialised with the input so untouched border words read back as
        // the input border.
        let dst_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GpuBlur dst"),
            contents: bytemuck::cast_slice(&words),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GpuBlur params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let readback_buf = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GpuBlur readback"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(e) = gpu.device.pop_error_scope().await {
            return Err(BlurError::DeviceMemoryError { reason: e.to_string() });
        }
        drop(words);

        // --- Dispatch ---
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GpuBlur BG"),
            layout: &bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
            ],
        });

        debug!(width, height, wg_x, wg_y, adapter = %gpu.adapter_info, "dispatching blur");
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("GpuBlur dispatch"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(ENTRY_POINT),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(wg_x, wg_y, 1);
        }
        encoder.copy_buffer_to_buffer(&dst_buf, 0, &readback_buf, 0, byte_len);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        if let Some(e) = gpu.device.pop_error_scope().await {
            return Err(BlurError::TransferFailure { reason: format!("dispatch rejected: {e}") });
        }

        // --- Readback ---
        let slice = readback_buf.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            // The receiver only goes away if this call already returned.
            let _ = tx.send(r);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(BlurError::TransferFailure { reason: format!("readback map failed: {e}") })
            }
            Err(_) => {
                return Err(BlurError::TransferFailure {
                    reason: "readback map callback never fired".to_string(),
                })
            }
        }

        let pixels = {
            let mapped = slice.get_mapped_range();
            let words: &[u32] = bytemuck::cast_slice(&mapped);
            unpack_rgb_words(words)
        };
        readback_buf.unmap();

        Ok(PixelGrid::from_output(src.width(), src.height(), pixels))
    }
}

impl Default for DeviceExecutor {
    fn default() -> Self {
        Self::new(DeviceOptions::default())
    }
}

impl Executor for DeviceExecutor {
    fn name(&self) -> &'static str {
        "device"
    }

    fn execute(&self, src: &PixelGrid) -> Result<PixelGrid> {
        self.run(src)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Grid dimensions as the `u32`s the shader indexes with.
fn device_dims(src: &PixelGrid) -> Result<(u32, u32)> {
    let too_big = || BlurError::DeviceMemoryError {
        reason: format!("{}×{} does not fit 32-bit device indexing", src.width(), src.height()),
    };
    let width = u32::try_from(src.width()).map_err(|_| too_big())?;
    let height = u32::try_from(src.height()).map_err(|_| too_big())?;
    // The shader computes `y * width + x` in u32.
    width.checked_mul(height).ok_or_else(too_big)?;
    Ok((width, height))
}

/// Size in bytes of the one-word-per-pixel buffer, checked against the
/// device's storage binding and buffer limits.
fn check_buffer_fits(pixels: usize, limits: &wgpu::Limits) -> Result<u64> {
    let bytes = (pixels as u64).saturating_mul(std::mem::size_of::<u32>() as u64);
    let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if bytes > max {
        return Err(BlurError::DeviceMemoryError {
            reason: format!("pixel buffer of {bytes} bytes exceeds device limit of {max} bytes"),
        });
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
