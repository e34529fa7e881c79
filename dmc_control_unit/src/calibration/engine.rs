//! Calibration state machine.
//!
//! | Mode    | Ticks           | Output                                      |
//! |---------|-----------------|---------------------------------------------|
//! | `None`  | -               | candidate                                   |
//! | `Timer` | until elapsed   | candidate                                   |
//! | `Poke`  | `2·nact·K`      | start, start + poke on odd phases           |
//! | `Rand`  | `2·K`           | start for `K` ticks, then start + offsets   |
//! | `Probe` | `NPROBE·K`      | start + probe `count_a / K`                 |
//!
//! After the last tick the start command is emitted once more and the run
//! reports completion.

use std::time::{Duration, Instant};

use dmc_common::consts::{DM_NACT, NPROBE};
use dmc_common::dm::{ActuatorCommand, CalibrationMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::CalibrationConfig;
use crate::model::ActuatorModel;

/// Engine parameters.
#[derive(Debug, Clone)]
pub struct CalibrationSettings {
    /// Actuators swept by POKE and offset by RAND (`<= DM_NACT`).
    pub nact: usize,
    /// Ticks per step (K), at least 1.
    pub images_per_step: u32,
    /// POKE amplitude and RAND scale [V].
    pub poke_volts: f64,
    pub timer: Duration,
    pub rand_seed: Option<u64>,
}

impl CalibrationSettings {
    pub fn from_config(config: &CalibrationConfig, nact: usize) -> Self {
        Self {
            nact,
            images_per_step: config.images_per_step,
            poke_volts: config.poke_volts,
            timer: config.timer_duration(),
            rand_seed: config.rand_seed,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTick {
    /// Mode the engine is in after this tick.
    pub mode: CalibrationMode,
    /// Step index within the run (`count_a / K`).
    pub step: u64,
    /// Set on the tick that finished a run of this mode.
    pub completed: Option<CalibrationMode>,
}

impl CalibrationTick {
    pub const fn idle() -> Self {
        Self {
            mode: CalibrationMode::None,
            step: 0,
            completed: None,
        }
    }

    const fn running(mode: CalibrationMode, step: u64) -> Self {
        Self {
            mode,
            step,
            completed: None,
        }
    }

    /// No run in progress and none finished on this tick.
    pub fn is_idle(&self) -> bool {
        self.mode == CalibrationMode::None && self.completed.is_none()
    }
}

/// Per-mode progress. `start` is the command in force at mode entry.
#[derive(Debug, Clone)]
enum RunState {
    Idle,
    Timer {
        entered: Instant,
    },
    Poke {
        count_a: u64,
        count_b: usize,
        start: ActuatorCommand,
    },
    Rand {
        count_a: u64,
        offsets: Vec<f64>,
        start: ActuatorCommand,
    },
    Probe {
        count_a: u64,
        start: ActuatorCommand,
    },
}

enum Step {
    Hold(ActuatorCommand, u64),
    Done(ActuatorCommand),
}

pub struct CalibrationEngine {
    nact: usize,
    k: u64,
    poke_volts: f64,
    timer: Duration,
    rng: StdRng,
    probes: Vec<Vec<f64>>,
    model: ActuatorModel,
    mode: CalibrationMode,
    run: RunState,
    finished: Option<CalibrationMode>,
}

impl CalibrationEngine {
    /// `probes` are `NPROBE` actuator-length patterns; `model` converts
    /// them to voltages around the start command.
    pub fn new(settings: CalibrationSettings, probes: Vec<Vec<f64>>, model: ActuatorModel) -> Self {
        let rng = match settings.rand_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            nact: settings.nact.min(DM_NACT),
            k: u64::from(settings.images_per_step.max(1)),
            poke_volts: settings.poke_volts,
            timer: settings.timer,
            rng,
            probes,
            model,
            mode: CalibrationMode::None,
            run: RunState::Idle,
            finished: None,
        }
    }

    /// Mode of the current run (`None` when idle or finished).
    pub fn mode(&self) -> CalibrationMode {
        if matches!(self.run, RunState::Idle) {
            CalibrationMode::None
        } else {
            self.mode
        }
    }

    /// Advance one tick.
    ///
    /// `requested` is the mode asked for through the control region and
    /// `reset` its reset flag. A reset or a change of requested mode clears
    /// all progress before anything else happens. Once a run completes, the
    /// engine stays idle until the request changes.
    pub fn advance_calibration(
        &mut self,
        requested: CalibrationMode,
        reset: bool,
        candidate: &ActuatorCommand,
        now: Instant,
    ) -> (ActuatorCommand, CalibrationTick) {
        if reset || requested != self.mode {
            if !matches!(self.run, RunState::Idle) {
                info!(from = self.mode.name(), to = requested.name(), reset, "calibration run cleared");
            }
            self.run = RunState::Idle;
            self.mode = requested;
            self.finished = None;
        }

        if requested == CalibrationMode::None || self.finished == Some(requested) {
            self.run = RunState::Idle;
            return (*candidate, CalibrationTick::idle());
        }

        let step = match requested {
            CalibrationMode::None => return (*candidate, CalibrationTick::idle()),
            CalibrationMode::Timer => self.tick_timer(candidate, now),
            CalibrationMode::Poke => self.tick_poke(candidate),
            CalibrationMode::Rand => self.tick_rand(candidate),
            CalibrationMode::Probe => self.tick_probe(candidate),
        };

        match step {
            Step::Hold(out, step) => (out, CalibrationTick::running(requested, step)),
            Step::Done(out) => {
                info!(mode = requested.name(), "calibration run complete");
                self.run = RunState::Idle;
                self.finished = Some(requested);
                (
                    out,
                    CalibrationTick {
                        mode: CalibrationMode::None,
                        step: 0,
                        completed: Some(requested),
                    },
                )
            }
        }
    }

    fn tick_timer(&mut self, candidate: &ActuatorCommand, now: Instant) -> Step {
        let entered = match self.run {
            RunState::Timer { entered } => entered,
            _ => {
                self.run = RunState::Timer { entered: now };
                now
            }
        };
        if now.saturating_duration_since(entered) > self.timer {
            Step::Done(*candidate)
        } else {
            Step::Hold(*candidate, 0)
        }
    }

    fn tick_poke(&mut self, candidate: &ActuatorCommand) -> Step {
        if !matches!(self.run, RunState::Poke { .. }) {
            debug!(nact = self.nact, k = self.k, "poke sweep started");
            self.run = RunState::Poke {
                count_a: 0,
                count_b: 0,
                start: *candidate,
            };
        }
        let (k, nact, poke) = (self.k, self.nact, self.poke_volts);
        let RunState::Poke {
            count_a,
            count_b,
            start,
        } = &mut self.run
        else {
            return Step::Hold(*candidate, 0);
        };

        if *count_a >= 2 * nact as u64 * k {
            return Step::Done(*start);
        }
        let phase = *count_a / k;
        let mut out = *start;
        if phase % 2 == 1 {
            *count_b = (phase / 2) as usize;
            out.act[*count_b] += poke;
        }
        *count_a += 1;
        Step::Hold(out, phase)
    }

    fn tick_rand(&mut self, candidate: &ActuatorCommand) -> Step {
        if !matches!(self.run, RunState::Rand { .. }) {
            let scale = self.poke_volts;
            let offsets = (0..self.nact)
                .map(|_| self.rng.gen_range(-1.0..=1.0) * scale)
                .collect();
            self.run = RunState::Rand {
                count_a: 0,
                offsets,
                start: *candidate,
            };
        }
        let k = self.k;
        let RunState::Rand {
            count_a,
            offsets,
            start,
        } = &mut self.run
        else {
            return Step::Hold(*candidate, 0);
        };

        if *count_a >= 2 * k {
            return Step::Done(*start);
        }
        let step = *count_a / k;
        let mut out = *start;
        if *count_a >= k {
            for (v, dv) in out.act.iter_mut().zip(offsets.iter()) {
                *v += dv;
            }
        }
        *count_a += 1;
        Step::Hold(out, step)
    }

    fn tick_probe(&mut self, candidate: &ActuatorCommand) -> Step {
        if !matches!(self.run, RunState::Probe { .. }) {
            self.run = RunState::Probe {
                count_a: 0,
                start: *candidate,
            };
        }
        let k = self.k;
        let RunState::Probe { count_a, start } = &mut self.run else {
            return Step::Hold(*candidate, 0);
        };

        if *count_a >= NPROBE as u64 * k {
            return Step::Done(*start);
        }
        let index = *count_a / k;
        let out = match self.probes.get(index as usize) {
            Some(pattern) => self.model.offset_lengths(start, pattern),
            None => *start,
        };
        *count_a += 1;
        Step::Hold(out, index)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
