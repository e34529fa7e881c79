//! EFC solver: field estimate to actuator length corrections.

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use super::FieldEstimate;
use crate::config::DmcConfig;
use crate::storage::CalibrationData;

/// Length corrections for one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct EfcSolution {
    /// Per active actuator, after rescaling.
    pub delta_active: Vec<f64>,
    /// Per physical actuator; unmapped actuators are zero.
    pub delta_full: Vec<f64>,
    /// Largest `|delta|` before rescaling.
    pub max_abs: f64,
    /// Uniform factor applied (1.0 when within limit).
    pub scale: f64,
}

pub struct EfcSolver {
    /// `[2·npix·nband][nactive]`.
    matrix: Array2<f64>,
    active2full: Vec<Option<usize>>,
    nact: usize,
    max_delta: Option<f64>,
}

impl EfcSolver {
    pub fn new(
        matrix: Array2<f64>,
        active2full: Vec<Option<usize>>,
        nact: usize,
        max_delta: Option<f64>,
    ) -> Self {
        Self {
            matrix,
            active2full,
            nact,
            max_delta,
        }
    }

    pub fn from_calibration(config: &DmcConfig, data: &CalibrationData) -> Self {
        Self::new(
            data.efc_matrix.clone(),
            data.active2full.clone(),
            config.dm.nact,
            config.howfs.max_delta,
        )
    }

    pub fn nactive(&self) -> usize {
        self.matrix.ncols()
    }

    /// `delta = Mᵀ · stack(real, imag)`, rescaled and mapped to full indices.
    pub fn solve(&self, estimate: &FieldEstimate) -> EfcSolution {
        let field = Array1::from_vec(estimate.stacked());
        if field.len() != self.matrix.nrows() {
            warn!(
                field = field.len(),
                rows = self.matrix.nrows(),
                "field estimate does not match control matrix; no correction"
            );
            return self.zero_solution();
        }

        let mut delta = self.matrix.t().dot(&field).to_vec();
        let Some((max_abs, scale)) = rescale_to_limit(&mut delta, self.max_delta) else {
            warn!("non-finite EFC correction discarded");
            return self.zero_solution();
        };
        if scale < 1.0 {
            debug!(max_abs, scale, "EFC correction rescaled to limit");
        }

        let mut delta_full = vec![0.0; self.nact];
        for (d, full) in delta.iter().zip(self.active2full.iter()) {
            if let Some(slot) = (*full).and_then(|i| delta_full.get_mut(i)) {
                *slot = *d;
            }
        }

        EfcSolution {
            delta_active: delta,
            delta_full,
            max_abs,
            scale,
        }
    }

    fn zero_solution(&self) -> EfcSolution {
        EfcSolution {
            delta_active: vec![0.0; self.nactive()],
            delta_full: vec![0.0; self.nact],
            max_abs: 0.0,
            scale: 1.0,
        }
    }
}

/// Scale `delta` uniformly so `max |delta_i| <= limit`.
///
/// Returns the pre-scaling maximum and the factor applied, or `None` if
/// `delta` holds a non-finite value.
pub fn rescale_to_limit(delta: &mut [f64], limit: Option<f64>) -> Option<(f64, f64)> {
    if delta.iter().any(|d| !d.is_finite()) {
        return None;
    }
    let max_abs = delta.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
    let scale = match limit {
        Some(limit) if max_abs > limit => limit / max_abs,
        _ => 1.0,
    };
    if scale != 1.0 {
        delta.iter_mut().for_each(|d| *d *= scale);
    }
    Some((max_abs, scale))
}
