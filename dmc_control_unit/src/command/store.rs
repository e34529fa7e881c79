//! Command Store.
//!
//! Each process owns a `CommandStore` handle for one actuator: the shared
//! control region plus this process's driver. `try_submit` order:
//!
//! 1. commander gate (never touches the lock)
//! 2. device ready and powered
//! 3. non-blocking lock acquisition
//! 4. clamp to the configured range
//! 5. transport send
//! 6. publish, only after the driver accepted
//!
//! Any early exit leaves the shared command untouched.

use std::sync::Arc;

use dmc_common::dm::{Actuator, ActuatorCommand, DeviceTelemetry, OperationalState, ProcessId};
use dmc_shared_memory::{ControlRegion, PublishedCommand, ShmArena, platform};
use tracing::{debug, warn};

use super::arbitration::{authorize, check_device};
use crate::error::Rejected;
use crate::transport::ActuatorTransport;

pub struct CommandStore<T: ActuatorTransport> {
    region: Arc<ShmArena<ControlRegion>>,
    actuator: Actuator,
    pid: u32,
    transport: T,
    vmin: f64,
    vmax: f64,
}

impl<T: ActuatorTransport> CommandStore<T> {
    pub fn new(
        region: Arc<ShmArena<ControlRegion>>,
        actuator: Actuator,
        transport: T,
        vmin: f64,
        vmax: f64,
    ) -> Self {
        Self {
            region,
            actuator,
            pid: platform::current_pid(),
            transport,
            vmin,
            vmax,
        }
    }

    /// Use `pid` as the lock owner id instead of the process id.
    ///
    /// Threads of one process standing in for separate processes need
    /// distinct ids.
    pub fn with_owner_id(mut self, pid: u32) -> Self {
        self.pid = pid.max(1);
        self
    }

    /// Last command accepted by the hardware. Never blocks.
    pub fn get_command(&self) -> ActuatorCommand {
        self.region.channel(self.actuator).command()
    }

    /// Last published record including telemetry and sequence.
    pub fn snapshot(&self) -> PublishedCommand {
        self.region.channel(self.actuator).snapshot()
    }

    pub fn last_telemetry(&self) -> DeviceTelemetry {
        self.snapshot().telemetry
    }

    pub fn operational_state(&self) -> OperationalState {
        self.region.operational_state()
    }

    /// Submit `candidate` on behalf of `requester`.
    pub fn try_submit(
        &mut self,
        candidate: &ActuatorCommand,
        requester: ProcessId,
    ) -> Result<(), Rejected> {
        let result = self.submit_inner(candidate, requester);
        if result.is_err() {
            self.region.channel(self.actuator).record_rejection();
        }
        result
    }

    fn submit_inner(
        &mut self,
        candidate: &ActuatorCommand,
        requester: ProcessId,
    ) -> Result<(), Rejected> {
        authorize(self.region.operational_state(), requester, self.actuator)?;

        let status = self.transport.status();
        check_device(&status)?;

        let channel = self.region.channel(self.actuator);
        let Some(guard) = channel.lock().try_acquire(self.pid) else {
            debug!(actuator = ?self.actuator, "command lock contended; skipping write");
            return Err(Rejected::Busy);
        };

        let mut command = *candidate;
        command.clamp(self.vmin, self.vmax);

        if let Err(e) = self.transport.send(&command) {
            warn!(transport = self.transport.name(), error = %e, "send failed; command unchanged");
            return Err(e.into());
        }

        let telemetry = self.transport.status().telemetry;
        let sequence = channel.publish(&guard, &command, telemetry);
        debug!(actuator = ?self.actuator, sequence, "command published");
        Ok(())
    }

    pub fn region(&self) -> &Arc<ShmArena<ControlRegion>> {
        &self.region
    }

    pub fn actuator(&self) -> Actuator {
        self.actuator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
