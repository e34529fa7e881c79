//! Scriptable in-process driver.

use dmc_common::dm::{ActuatorCommand, DeviceFlags, DeviceTelemetry, TransportStatus};
use tracing::trace;

use super::ActuatorTransport;
use crate::error::TransportError;

/// Records every accepted command; failures and power loss can be scripted.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    flags: DeviceFlags,
    telemetry: DeviceTelemetry,
    last: Option<ActuatorCommand>,
    fail_next: u32,
    failure: TransportError,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// Powered, ready, high voltage on.
    pub fn new() -> Self {
        Self {
            flags: DeviceFlags::READY | DeviceFlags::POWERED | DeviceFlags::HV_ENABLED,
            telemetry: DeviceTelemetry {
                supply_v: 200.0,
                temperature_c: 25.0,
                frames_sent: 0,
            },
            last: None,
            fail_next: 0,
            failure: TransportError::Timeout,
        }
    }

    pub fn set_flags(&mut self, flags: DeviceFlags) {
        self.flags = flags;
    }

    pub fn power_off(&mut self) {
        self.flags = DeviceFlags::empty();
    }

    /// Fail the next `count` sends with `error`.
    pub fn fail_next(&mut self, count: u32, error: TransportError) {
        self.fail_next = count;
        self.failure = error;
    }

    /// Last command the simulated driver applied.
    pub fn last_sent(&self) -> Option<&ActuatorCommand> {
        self.last.as_ref()
    }

    pub fn sent_count(&self) -> u64 {
        self.telemetry.frames_sent
    }
}

impl ActuatorTransport for SimulatedTransport {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn status(&self) -> TransportStatus {
        TransportStatus {
            flags: self.flags,
            telemetry: self.telemetry,
        }
    }

    fn send(&mut self, command: &ActuatorCommand) -> Result<(), TransportError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(self.failure.clone());
        }
        if !self.flags.contains(DeviceFlags::READY) {
            return Err(TransportError::Disconnected);
        }
        self.last = Some(*command);
        self.telemetry.frames_sent += 1;
        trace!(frames = self.telemetry.frames_sent, "simulated send");
        Ok(())
    }
}
