// gpu/mod.rs — compute-device execution of the blur.
//
// The CPU executors in the parent crate are the reference; the device
// kernel is checked against `SequentialExecutor` to within 1 per channel.
//
//   device — adapter selection, device/queue acquisition, workgroup sizing
//   blur   — `DeviceExecutor`: upload, dispatch, readback
//
// A failure here is returned as a device error. Nothing in this module
// reruns the work on the CPU.

pub mod blur;
pub mod device;
