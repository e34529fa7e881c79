//! Commander arbitration.
//!
//! The policy table lives in `dmc_common::dm::state`; this module turns
//! its answers into submission rejections. Both checks are pure and run
//! before the command lock is touched.

use dmc_common::dm::{Actuator, OperationalState, ProcessId, TransportStatus, is_commander};
use tracing::debug;

use crate::error::Rejected;

/// `Ok` when `requester` commands `actuator` in `state`.
#[inline]
pub fn authorize(
    state: OperationalState,
    requester: ProcessId,
    actuator: Actuator,
) -> Result<(), Rejected> {
    if is_commander(state, requester, actuator) {
        Ok(())
    } else {
        debug!(?state, ?requester, ?actuator, "submission from non-commander");
        Err(Rejected::NotCommander)
    }
}

/// `Ok` when the driver is ready and powered.
#[inline]
pub fn check_device(status: &TransportStatus) -> Result<(), Rejected> {
    if status.ready() && status.powered() {
        Ok(())
    } else {
        Err(Rejected::NotReady)
    }
}
