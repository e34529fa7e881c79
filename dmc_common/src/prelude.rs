//! Common re-exports.
//!
//! ```rust
//! use dmc_common::prelude::*;
//! ```

pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::consts::*;
pub use crate::dm::{
    Actuator, ActuatorCommand, CalibrationMode, DeviceFlags, DeviceTelemetry, OperationalState,
    ProcessId, TransportStatus, clamp_volts, is_commander,
};
pub use crate::shm::{RegionHeader, struct_version_hash};
