//! Actuator command value object.
//!
//! `ActuatorCommand` is the unit written to the Command Store and handed to
//! the actuator transport. It is `Copy` and `#[repr(C)]` so it can live in
//! the shared control region and is always copied across the process
//! boundary, never aliased.

use crate::consts::{DM_NACT, DM_NTEST, DM_VMAX, DM_VMIN};

/// Actuator voltages plus driver test-point voltages.
#[derive(Clone, Copy, PartialEq)]
#[repr(C)]
pub struct ActuatorCommand {
    /// Per-actuator voltage [V].
    pub act: [f64; DM_NACT],
    /// Per-test-point voltage [V].
    pub test: [f64; DM_NTEST],
}

impl ActuatorCommand {
    /// All actuators and test points at 0 V.
    pub const fn zeroed() -> Self {
        Self {
            act: [0.0; DM_NACT],
            test: [0.0; DM_NTEST],
        }
    }

    /// All actuators at `volts`, test points at 0 V.
    pub fn uniform(volts: f64) -> Self {
        Self {
            act: [volts; DM_NACT],
            test: [0.0; DM_NTEST],
        }
    }

    /// Limit every element to `[vmin, vmax]` in place.
    ///
    /// NaN elements are forced to `vmin`.
    pub fn clamp(&mut self, vmin: f64, vmax: f64) {
        for v in self.act.iter_mut().chain(self.test.iter_mut()) {
            *v = clamp_volts(*v, vmin, vmax);
        }
    }

    /// Copy of `self` limited to the driver range `[DM_VMIN, DM_VMAX]`.
    pub fn clamped(&self) -> Self {
        let mut out = *self;
        out.clamp(DM_VMIN, DM_VMAX);
        out
    }

    /// Returns true if every element lies in `[vmin, vmax]`.
    pub fn is_within(&self, vmin: f64, vmax: f64) -> bool {
        self.act
            .iter()
            .chain(self.test.iter())
            .all(|v| *v >= vmin && *v <= vmax)
    }

    /// Largest absolute actuator difference to `other` [V].
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.act
            .iter()
            .zip(other.act.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl Default for ActuatorCommand {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl core::fmt::Debug for ActuatorCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (min, max) = self
            .act
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        f.debug_struct("ActuatorCommand")
            .field("nact", &DM_NACT)
            .field("act_min", &min)
            .field("act_max", &max)
            .field("test", &self.test)
            .finish()
    }
}

/// Limit a single voltage to `[vmin, vmax]`; NaN maps to `vmin`.
#[inline]
pub fn clamp_volts(v: f64, vmin: f64, vmax: f64) -> f64 {
    if v.is_nan() {
        vmin
    } else {
        v.clamp(vmin, vmax)
    }
}

const _: () = assert!(core::mem::size_of::<ActuatorCommand>() == (DM_NACT + DM_NTEST) * 8);
