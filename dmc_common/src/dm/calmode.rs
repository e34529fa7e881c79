//! Calibration mode requested through the shared control region.

use serde::{Deserialize, Serialize};

/// Open-loop calibration sequence selector.
///
/// `None` is both the initial and the terminal mode of every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CalibrationMode {
    /// Pass the candidate through.
    #[default]
    None = 0,
    /// Hold for a wall-clock duration, no perturbation.
    Timer = 1,
    /// Single-actuator poke sweep.
    Poke = 2,
    /// Random all-actuator offset.
    Rand = 3,
    /// Hold each HOWFS probe pattern in turn.
    Probe = 4,
}

impl CalibrationMode {
    pub const ALL: [Self; 5] = [Self::None, Self::Timer, Self::Poke, Self::Rand, Self::Probe];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Timer),
            2 => Some(Self::Poke),
            3 => Some(Self::Rand),
            4 => Some(Self::Probe),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Timer => "timer",
            Self::Poke => "poke",
            Self::Rand => "rand",
            Self::Probe => "probe",
        }
    }
}
