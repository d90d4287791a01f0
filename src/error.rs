// error.rs — the crate-wide error type.
//
// One enum covers all three executors. Device failures keep their own
// variants so a caller can tell "no GPU here" apart from "the GPU choked on
// this image" and decide for itself whether to rerun on a CPU executor.
// Nothing in this crate falls back on its own.

use thiserror::Error;

use crate::partition::Band;

/// Errors surfaced by grid construction, configuration and the executors.
#[derive(Debug, Error)]
pub enum BlurError {
    /// The input grid or an executor parameter is malformed.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A row-band worker panicked or could not be spawned. Reported only
    /// after every other worker has been joined.
    #[error("worker for rows {band} failed: {reason}")]
    WorkerFailure { band: Band, reason: String },

    /// No compute adapter or device could be acquired.
    #[error("compute backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// The blur shader or its pipeline failed validation.
    #[error("device kernel build failed: {reason}")]
    KernelBuildFailure { reason: String },

    /// A device buffer could not be allocated, or the image does not fit
    /// the device limits.
    #[error("device memory error: {reason}")]
    DeviceMemoryError { reason: String },

    /// The dispatch was rejected, or mapping the result buffer back to the
    /// host failed.
    #[error("device transfer failed: {reason}")]
    TransferFailure { reason: String },

    /// A configuration value could not be parsed.
    #[error("invalid configuration value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
}

impl BlurError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        BlurError::InvalidInput { reason: reason.into() }
    }
}

pub type Result<T, E = BlurError> = std::result::Result<T, E>;
