//! Flat updater: the only place the running flat is modified.

use dmc_common::dm::{ActuatorCommand, clamp_volts};
use tracing::info;

use crate::config::DmcConfig;
use crate::error::StorageError;
use crate::model::ActuatorModel;
use crate::storage::blob::{DM_FLAT, encode_f64};
use crate::storage::{CalibrationData, CalibrationStorage};

/// Summary of one flat update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatUpdate {
    pub iteration: u64,
    /// RMS voltage change over the updated actuators [V].
    pub rms_step: f64,
    /// Largest voltage change [V].
    pub max_step: f64,
    /// Actuators whose voltage changed.
    pub changed: usize,
}

pub struct FlatUpdater {
    flat: ActuatorCommand,
    persisted: ActuatorCommand,
    model: ActuatorModel,
    nact: usize,
    gain: f64,
    vmin: f64,
    vmax: f64,
    iterations: u64,
}

impl FlatUpdater {
    pub fn new(
        flat: ActuatorCommand,
        model: ActuatorModel,
        nact: usize,
        gain: f64,
        vmin: f64,
        vmax: f64,
    ) -> Self {
        let mut flat = flat;
        flat.clamp(vmin, vmax);
        Self {
            flat,
            persisted: flat,
            model,
            nact: nact.min(flat.act.len()),
            gain,
            vmin,
            vmax,
            iterations: 0,
        }
    }

    /// Start from the persisted flat, or all actuators at `vmin` when none
    /// was stored.
    pub fn from_calibration(config: &DmcConfig, data: &CalibrationData) -> Self {
        let flat = data
            .flat
            .unwrap_or_else(|| ActuatorCommand::uniform(config.dm.vmin));
        Self::new(
            flat,
            data.model.clone(),
            config.dm.nact,
            config.howfs.gain,
            config.dm.vmin,
            config.dm.vmax,
        )
    }

    pub fn flat(&self) -> &ActuatorCommand {
        &self.flat
    }

    pub fn model(&self) -> &ActuatorModel {
        &self.model
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Fold per-actuator length deltas into the flat.
    ///
    /// `flat_new = flat_old + gain·(v_new − v_old)`, clamped to the
    /// configured range. Uncalibrated actuators are left unchanged.
    pub fn apply(&mut self, delta_full: &[f64]) -> FlatUpdate {
        let mut sum_sq = 0.0;
        let mut max_step = 0.0_f64;
        let mut changed = 0;

        for (i, dl) in delta_full.iter().enumerate().take(self.nact) {
            if *dl == 0.0 {
                continue;
            }
            let v_old = self.flat.act[i];
            let Some(v_new) = self.model.voltage_after(i, v_old, *dl) else {
                continue;
            };
            let v = clamp_volts(v_old + self.gain * (v_new - v_old), self.vmin, self.vmax);
            let step = v - v_old;
            if step != 0.0 {
                changed += 1;
                sum_sq += step * step;
                max_step = max_step.max(step.abs());
            }
            self.flat.act[i] = v;
        }

        self.iterations += 1;
        let rms_step = if changed > 0 {
            (sum_sq / changed as f64).sqrt()
        } else {
            0.0
        };
        info!(
            iteration = self.iterations,
            rms_step, max_step, changed, "flat updated"
        );
        FlatUpdate {
            iteration: self.iterations,
            rms_step,
            max_step,
            changed,
        }
    }

    /// Write the running flat to storage and make it the revert point.
    pub fn save_flat(&mut self, storage: &mut dyn CalibrationStorage) -> Result<(), StorageError> {
        storage.write_blob(DM_FLAT, &encode_f64(&self.flat.act[..self.nact]))?;
        self.persisted = self.flat;
        info!(iterations = self.iterations, "flat saved");
        Ok(())
    }

    /// Discard corrections since the last load or save.
    pub fn revert(&mut self) {
        self.flat = self.persisted;
        info!("flat reverted to persisted command");
    }
}
