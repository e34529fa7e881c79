//! Error taxonomy of the control core.
//!
//! Runtime paths never panic: a rejected submission skips the tick, a
//! missing calibration blob degrades to zeros, a frame gap restarts the
//! probe cycle. Only [`StartupError`] is fatal, and only before the loop
//! starts.

use dmc_common::config::ConfigError;
use dmc_shared_memory::ShmError;
use thiserror::Error;

/// Failure reported by the actuator transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport I/O failure: {0}")]
    Io(String),
    #[error("transport timed out")]
    Timeout,
    #[error("transport disconnected")]
    Disconnected,
}

/// Why `try_submit` refused a candidate. The Command Store is unchanged in
/// every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    /// Requester is not the commander for this actuator in the current state.
    #[error("requester is not the commander for this actuator")]
    NotCommander,
    /// Actuator driver is not ready or not powered; retry next tick.
    #[error("actuator driver not ready")]
    NotReady,
    /// Another writer holds the command lock; the write is abandoned.
    #[error("command store busy")]
    Busy,
    /// The driver refused or failed the send.
    #[error("transport failed: {0}")]
    TransportFailed(#[from] TransportError),
}

/// Calibration blob storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob {name} not found")]
    NotFound { name: String },

    #[error("blob {name} has {found} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("blob {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A blob that could not be loaded and was replaced by zeros.
#[derive(Debug, Error)]
#[error("calibration data missing: {blob} ({reason})")]
pub struct CalibrationDataMissing {
    pub blob: &'static str,
    pub reason: StorageError,
}

/// Fatal errors before the control loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shm(#[from] ShmError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Calibration data that cannot match the configured dimensions.
    #[error("structural mismatch: {0}")]
    Structure(String),
}
