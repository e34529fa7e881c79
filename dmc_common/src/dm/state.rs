//! Operational state and commander policy.
//!
//! The supervisor selects an `OperationalState`; each state names at most
//! one commanding process per actuator. The policy is a pure lookup so
//! call sites ask a single question (`is_commander`) instead of matching
//! on process identity themselves.

use serde::{Deserialize, Serialize};

/// Logical subsystem (one OS process each) that may request actuator writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProcessId {
    /// Supervisor / watchdog.
    Watchdog = 0,
    /// Science camera (HOWFS / EFC).
    Sci = 1,
    /// Shack-Hartmann wavefront sensor.
    Shk = 2,
    /// Lyot low-order wavefront sensor.
    Lyt = 3,
    /// Acquisition camera.
    Acq = 4,
    /// Telemetry.
    Tlm = 5,
}

impl ProcessId {
    pub const ALL: [Self; 6] = [
        Self::Watchdog,
        Self::Sci,
        Self::Shk,
        Self::Lyt,
        Self::Acq,
        Self::Tlm,
    ];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Watchdog),
            1 => Some(Self::Sci),
            2 => Some(Self::Shk),
            3 => Some(Self::Lyt),
            4 => Some(Self::Acq),
            5 => Some(Self::Tlm),
            _ => None,
        }
    }
}

/// Commanded device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Actuator {
    /// High-order MEMS deformable mirror (HOWFS/EFC target).
    Bmc = 0,
    /// Low-order deformable mirror.
    Alp = 1,
}

impl Actuator {
    pub const ALL: [Self; 2] = [Self::Bmc, Self::Alp];
}

/// Instrument operational state, set by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum OperationalState {
    /// Everything idle, no commanders.
    #[default]
    Standby = 0,
    /// Drivers off.
    LowPower = 1,
    /// Shack-Hartmann calibrates the low-order DM.
    ShkAlpCalibrate = 2,
    /// Lyot sensor calibrates the low-order DM.
    LytAlpCalibrate = 3,
    /// Science camera calibrates the high-order DM.
    SciBmcCalibrate = 4,
    /// Shack-Hartmann closes the low-order loop.
    ShkZernLowfc = 5,
    /// Lyot sensor closes the low-order loop.
    LytZernLowfc = 6,
    /// Science camera runs HOWFS/EFC dark-hole control; Lyot keeps the low-order loop.
    SciHowfsEfc = 7,
}

impl OperationalState {
    pub const ALL: [Self; 8] = [
        Self::Standby,
        Self::LowPower,
        Self::ShkAlpCalibrate,
        Self::LytAlpCalibrate,
        Self::SciBmcCalibrate,
        Self::ShkZernLowfc,
        Self::LytZernLowfc,
        Self::SciHowfsEfc,
    ];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Standby),
            1 => Some(Self::LowPower),
            2 => Some(Self::ShkAlpCalibrate),
            3 => Some(Self::LytAlpCalibrate),
            4 => Some(Self::SciBmcCalibrate),
            5 => Some(Self::ShkZernLowfc),
            6 => Some(Self::LytZernLowfc),
            7 => Some(Self::SciHowfsEfc),
            _ => None,
        }
    }

    /// The process authorized to write `actuator` in this state, if any.
    pub const fn commander_for(self, actuator: Actuator) -> Option<ProcessId> {
        use Actuator::*;
        use OperationalState::*;
        match (self, actuator) {
            (ShkAlpCalibrate, Alp) | (ShkZernLowfc, Alp) => Some(ProcessId::Shk),
            (LytAlpCalibrate, Alp) | (LytZernLowfc, Alp) | (SciHowfsEfc, Alp) => {
                Some(ProcessId::Lyt)
            }
            (SciBmcCalibrate, Bmc) | (SciHowfsEfc, Bmc) => Some(ProcessId::Sci),
            _ => None,
        }
    }

    /// Returns true when this state expects the dark-hole loop to fold
    /// corrections into the high-order flat.
    pub const fn runs_efc(self) -> bool {
        matches!(self, Self::SciHowfsEfc)
    }
}

/// Capability check: may `requester` write `actuator` in `state`?
#[inline]
pub fn is_commander(state: OperationalState, requester: ProcessId, actuator: Actuator) -> bool {
    state.commander_for(actuator) == Some(requester)
}
