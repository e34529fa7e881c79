//! Per-actuator length/voltage relation.
//!
//! Each actuator was fitted with `length = a·v² + b·v`. Probe patterns and
//! EFC corrections are expressed as length deltas and turned into voltages
//! here.

use dmc_common::dm::ActuatorCommand;

/// Coefficient magnitude treated as zero.
const COEFF_EPS: f64 = 1e-12;

/// Fitted quadratic coefficients for every actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorModel {
    a: Vec<f64>,
    b: Vec<f64>,
}

impl ActuatorModel {
    /// `a` and `b` must have equal length (one entry per actuator).
    pub fn new(a: Vec<f64>, b: Vec<f64>) -> Self {
        debug_assert_eq!(a.len(), b.len());
        Self { a, b }
    }

    /// Linear model `length = gain·v` for every actuator.
    pub fn linear(nact: usize, gain: f64) -> Self {
        Self::new(vec![0.0; nact], vec![gain; nact])
    }

    pub fn nact(&self) -> usize {
        self.a.len()
    }

    /// Length of actuator `i` at voltage `v`.
    pub fn length(&self, i: usize, v: f64) -> f64 {
        self.a[i] * v * v + self.b[i] * v
    }

    /// Voltage that moves actuator `i` from `v_old` by `dlength`.
    ///
    /// Solves `a·v² + b·v = a·v_old² + b·v_old + dlength` on the branch
    /// through `v_old`. With `a ≈ 0` the linear solution is used; with
    /// `b ≈ 0` as well the actuator is uncalibrated and `None` is returned.
    /// A target below the parabola's reach clamps to its vertex.
    pub fn voltage_after(&self, i: usize, v_old: f64, dlength: f64) -> Option<f64> {
        let (a, b) = (self.a[i], self.b[i]);
        if a.abs() < COEFF_EPS {
            if b.abs() < COEFF_EPS {
                return None;
            }
            return Some(v_old + dlength / b);
        }
        let target = a * v_old * v_old + b * v_old + dlength;
        let disc = b * b + 4.0 * a * target;
        if disc < 0.0 {
            return Some(-b / (2.0 * a));
        }
        Some((disc.sqrt() - b) / (2.0 * a))
    }

    /// `base` with actuator lengths offset by `dlength` (one entry per
    /// actuator, extra entries ignored). Uncalibrated actuators keep their
    /// voltage; test points are copied unchanged.
    pub fn offset_lengths(&self, base: &ActuatorCommand, dlength: &[f64]) -> ActuatorCommand {
        let mut out = *base;
        for (i, dl) in dlength.iter().enumerate().take(self.nact()) {
            if *dl == 0.0 {
                continue;
            }
            if let Some(v) = self.voltage_after(i, base.act[i], *dl) {
                out.act[i] = v;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fallback() {
        let model = ActuatorModel::new(vec![0.0], vec![2.0]);
        assert_eq!(model.voltage_after(0, 10.0, 4.0), Some(12.0));
    }

    #[test]
    fn uncalibrated_actuator_is_left_alone() {
        let model = ActuatorModel::new(vec![0.0], vec![0.0]);
        assert_eq!(model.voltage_after(0, 10.0, 4.0), None);
    }

    #[test]
    fn quadratic_inverts_length() {
        let model = ActuatorModel::new(vec![0.01, 2e-4], vec![0.5, 0.03]);
        for i in 0..2 {
            for (v_old, dl) in [(50.0, 0.3), (120.0, -0.2), (0.0, 1.0)] {
                let v_new = model.voltage_after(i, v_old, dl).unwrap();
                let achieved = model.length(i, v_new) - model.length(i, v_old);
                assert!((achieved - dl).abs() < 1e-9, "i={i} v_old={v_old} dl={dl}");
            }
        }
    }

    #[test]
    fn unreachable_target_clamps_to_vertex() {
        let model = ActuatorModel::new(vec![1.0], vec![2.0]);
        // minimum length is -1 at v = -1
        assert_eq!(model.voltage_after(0, 0.0, -10.0), Some(-1.0));
    }

    #[test]
    fn offset_lengths_touches_only_nonzero_entries() {
        let model = ActuatorModel::linear(4, 0.5);
        let base = ActuatorCommand::uniform(100.0);
        let out = model.offset_lengths(&base, &[0.0, 1.0, -0.5, 0.0]);
        assert_eq!(out.act[0], 100.0);
        assert_eq!(out.act[1], 102.0);
        assert_eq!(out.act[2], 99.0);
        assert_eq!(out.act[4], 100.0);
        assert_eq!(out.test, base.test);
    }
}
