//! Per-frame orchestration of the dark-hole loop.
//!
//! One science image drives one tick:
//!
//! 1. HOWFS phase assignment (and, on the last phase, field estimation).
//! 2. Calibration engine, advanced only while `Sci` commands the `Bmc`.
//!    A running (or just finished) calibration discards the probe cycle, as
//!    does the first image exposed after one.
//! 3. Otherwise: EFC solve and flat update (only in `SciHowfsEfc`), then
//!    candidate = flat plus the probe the next image will be exposed under.
//! 4. `try_submit` as `Sci` on the `Bmc` channel; the outcome is counted.
//!
//! Nothing here blocks or panics. Rejections are normal operation and are
//! counted, not propagated.

use std::sync::Arc;
use std::time::Instant;

use dmc_common::consts::NPROBE;
use dmc_common::dm::{Actuator, ActuatorCommand, ProcessId, is_commander};
use dmc_shared_memory::{ControlRegion, ShmArena};
use serde::Serialize;
use tracing::{debug, info};

use crate::calibration::{CalibrationEngine, CalibrationSettings, CalibrationTick};
use crate::command::CommandStore;
use crate::config::DmcConfig;
use crate::error::Rejected;
use crate::howfs::{
    EfcSolution, EfcSolver, FieldEstimator, FlatUpdate, FlatUpdater, HowfsController, ScienceImage,
};
use crate::storage::CalibrationData;
use crate::transport::ActuatorTransport;

// ─── Loop Statistics ────────────────────────────────────────────────

/// O(1) per-frame counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopStats {
    /// Frames processed.
    pub frames: u64,
    /// HOWFS cycles that produced a field estimate.
    pub completions: u64,
    /// Completions folded into the flat.
    pub efc_updates: u64,
    /// Frames whose number did not follow the previous one.
    pub continuity_breaks: u64,
    pub accepted: u64,
    pub rejected_not_commander: u64,
    pub rejected_not_ready: u64,
    pub rejected_busy: u64,
    pub rejected_transport: u64,
    /// Calibration runs that finished.
    pub calibrations_completed: u64,
    /// Last tick duration [ns].
    pub last_tick_ns: u64,
    /// Maximum tick duration [ns].
    pub max_tick_ns: u64,
    /// Running sum for average computation.
    pub sum_tick_ns: u64,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one submission outcome.
    pub fn record_submit(&mut self, result: &Result<(), Rejected>) {
        match result {
            Ok(()) => self.accepted += 1,
            Err(Rejected::NotCommander) => self.rejected_not_commander += 1,
            Err(Rejected::NotReady) => self.rejected_not_ready += 1,
            Err(Rejected::Busy) => self.rejected_busy += 1,
            Err(Rejected::TransportFailed(_)) => self.rejected_transport += 1,
        }
    }

    #[inline]
    pub fn record_tick(&mut self, duration_ns: u64) {
        self.last_tick_ns = duration_ns;
        self.max_tick_ns = self.max_tick_ns.max(duration_ns);
        self.sum_tick_ns = self.sum_tick_ns.saturating_add(duration_ns);
    }

    /// Average tick time [ns] (0 if no frames).
    pub fn avg_tick_ns(&self) -> u64 {
        self.sum_tick_ns.checked_div(self.frames).unwrap_or(0)
    }

    /// Sum of all rejection counters.
    pub fn rejected(&self) -> u64 {
        self.rejected_not_commander + self.rejected_not_ready + self.rejected_busy + self.rejected_transport
    }
}

// ─── Frame Outcome ──────────────────────────────────────────────────

/// What one tick did.
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub frame_number: u64,
    /// HOWFS phase of the image just processed.
    pub ihowfs: usize,
    /// Probe carried by the submitted command, if any.
    pub probe_applied: Option<usize>,
    /// Set when the image closed a cycle and EFC ran.
    pub efc: Option<EfcSolution>,
    pub flat_update: Option<FlatUpdate>,
    pub calibration: CalibrationTick,
    /// Command handed to `try_submit` (before clamping).
    pub candidate: ActuatorCommand,
    pub submit: Result<(), Rejected>,
}

// ─── Dark-Hole Loop ─────────────────────────────────────────────────

pub struct DarkHoleLoop<T: ActuatorTransport> {
    store: CommandStore<T>,
    howfs: HowfsController,
    efc: EfcSolver,
    flat: FlatUpdater,
    calibration: CalibrationEngine,
    probes: Vec<Vec<f64>>,
    /// The last submitted command came from a calibration run.
    calibrating: bool,
    stats: LoopStats,
}

impl<T: ActuatorTransport> DarkHoleLoop<T> {
    pub fn new(
        store: CommandStore<T>,
        howfs: HowfsController,
        efc: EfcSolver,
        flat: FlatUpdater,
        calibration: CalibrationEngine,
        probes: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            store,
            howfs,
            efc,
            flat,
            calibration,
            probes,
            calibrating: false,
            stats: LoopStats::new(),
        }
    }

    /// Wire every stage from configuration and loaded calibration data.
    pub fn from_config(
        config: &DmcConfig,
        data: &CalibrationData,
        region: Arc<ShmArena<ControlRegion>>,
        transport: T,
    ) -> Self {
        let store = CommandStore::new(region, Actuator::Bmc, transport, config.dm.vmin, config.dm.vmax);
        let howfs = HowfsController::new(FieldEstimator::from_calibration(config, data));
        let efc = EfcSolver::from_calibration(config, data);
        let flat = FlatUpdater::from_calibration(config, data);
        let calibration = CalibrationEngine::new(
            CalibrationSettings::from_config(&config.calibration, config.dm.nact),
            data.probes.clone(),
            data.model.clone(),
        );
        info!(
            nact = config.dm.nact,
            npix = config.howfs.npix,
            nband = config.howfs.nband,
            nactive = efc.nactive(),
            "dark-hole loop ready"
        );
        Self::new(store, howfs, efc, flat, calibration, data.probes.clone())
    }

    /// Run one tick for `image`. `now` drives the calibration timer.
    pub fn on_frame(&mut self, image: ScienceImage, now: Instant) -> FrameOutcome {
        let started = Instant::now();
        let frame_number = image.frame_number;
        let state = self.store.operational_state();

        // An image taken after a calibration command cannot belong to a cycle.
        let exposed_under_calibration = self.calibrating;
        let fresh = self.howfs.cycle().ihowfs().is_none();
        let tick = self.howfs.on_image(image);
        if tick.restarted && !fresh {
            self.stats.continuity_breaks += 1;
            debug!(frame_number, "HOWFS cycle restarted");
        }

        let (calibrated, calibration) = if is_commander(state, ProcessId::Sci, Actuator::Bmc) {
            let region = Arc::clone(self.store.region());
            let requested = region.requested_calibration();
            let reset = region.take_calibration_reset();
            let (command, calibration) =
                self.calibration
                    .advance_calibration(requested, reset, self.flat.flat(), now);
            region.report_calibration(calibration.mode, calibration.step, calibration.completed);
            (command, calibration)
        } else {
            (*self.flat.flat(), CalibrationTick::idle())
        };
        if calibration.completed.is_some() {
            self.stats.calibrations_completed += 1;
        }
        self.calibrating = !calibration.is_idle();

        let mut efc = None;
        let mut flat_update = None;
        let mut probe_applied = None;
        let command = if self.calibrating || exposed_under_calibration {
            self.howfs.invalidate();
            if tick.estimate.is_some() {
                debug!(frame_number, "HOWFS cycle discarded during calibration");
            }
            if self.calibrating { calibrated } else { *self.flat.flat() }
        } else {
            if let Some(estimate) = tick.estimate.as_ref() {
                self.stats.completions += 1;
                if state.runs_efc() {
                    let solution = self.efc.solve(estimate);
                    flat_update = Some(self.flat.apply(&solution.delta_full));
                    self.stats.efc_updates += 1;
                    efc = Some(solution);
                } else {
                    debug!(?state, "HOWFS cycle complete; flat left unchanged");
                }
            }
            probe_applied = tick
                .probe_next
                .filter(|p| state.runs_efc() && *p < NPROBE && *p < self.probes.len());
            match probe_applied {
                Some(p) => self.flat.model().offset_lengths(self.flat.flat(), &self.probes[p]),
                None => *self.flat.flat(),
            }
        };

        let submit = self.store.try_submit(&command, ProcessId::Sci);
        self.stats.record_submit(&submit);
        self.stats.frames += 1;
        self.stats
            .record_tick(u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX));

        FrameOutcome {
            frame_number,
            ihowfs: tick.ihowfs,
            probe_applied,
            efc,
            flat_update,
            calibration,
            candidate: command,
            submit,
        }
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn store(&self) -> &CommandStore<T> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CommandStore<T> {
        &mut self.store
    }

    pub fn howfs(&self) -> &HowfsController {
        &self.howfs
    }

    pub fn flat(&self) -> &FlatUpdater {
        &self.flat
    }

    pub fn flat_mut(&mut self) -> &mut FlatUpdater {
        &mut self.flat
    }
}
