//! Deformable-mirror domain types shared between processes.

pub mod calmode;
pub mod command;
pub mod device;
pub mod state;

pub use calmode::CalibrationMode;
pub use command::{ActuatorCommand, clamp_volts};
pub use device::{DeviceFlags, DeviceTelemetry, TransportStatus};
pub use state::{Actuator, OperationalState, ProcessId, is_commander};
