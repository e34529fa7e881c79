//! Actuator transport seam.
//!
//! The driver link (USB framing, DMA, status bytes) lives outside this
//! crate. The control core only needs to ask whether the driver is usable
//! and to hand it a complete, already clamped command.
//!
//! # Timing
//!
//! `send` is called with the command lock held and bounds the lock hold
//! time; implementations should return `TransportError::Timeout` rather
//! than block indefinitely. Retry and backoff, if any, belong here too.

pub mod simulation;

pub use simulation::SimulatedTransport;

use dmc_common::dm::{ActuatorCommand, TransportStatus};

use crate::error::TransportError;

/// Interface for pluggable actuator drivers.
pub trait ActuatorTransport: Send {
    /// Driver identifier for logs (e.g. "simulation", "bmc-usb").
    fn name(&self) -> &'static str;

    /// Current readiness, power and telemetry.
    fn status(&self) -> TransportStatus;

    /// Apply all actuator and test-point voltages as one unit.
    fn send(&mut self, command: &ActuatorCommand) -> Result<(), TransportError>;
}

impl<T: ActuatorTransport + ?Sized> ActuatorTransport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn status(&self) -> TransportStatus {
        (**self).status()
    }

    fn send(&mut self, command: &ActuatorCommand) -> Result<(), TransportError> {
        (**self).send(command)
    }
}
