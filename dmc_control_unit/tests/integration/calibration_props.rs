//! Property tests: clamping and calibration round trips.
//!
//! Validates: every published command lies in `[vmin, vmax]` for any
//! candidate, and a POKE sweep of any size pokes each actuator exactly
//! once and ends on the command it started from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dmc_common::consts::DM_NACT;
use dmc_common::dm::{Actuator, ActuatorCommand, CalibrationMode, OperationalState, ProcessId};
use dmc_control_unit::calibration::{CalibrationEngine, CalibrationSettings};
use dmc_control_unit::command::CommandStore;
use dmc_control_unit::model::ActuatorModel;
use dmc_control_unit::transport::SimulatedTransport;
use dmc_shared_memory::{ControlRegion, ShmArena};
use proptest::prelude::*;

fn engine(nact: usize, k: u32, poke_volts: f64) -> CalibrationEngine {
    CalibrationEngine::new(
        CalibrationSettings {
            nact,
            images_per_step: k,
            poke_volts,
            timer: Duration::from_secs(1),
            rand_seed: Some(3),
        },
        Vec::new(),
        ActuatorModel::linear(nact, 1.0),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn published_command_is_clamped(
        values in prop::collection::vec(-500.0f64..500.0, 16),
        vmin in 0.0f64..50.0,
        span in 1.0f64..150.0,
    ) {
        let vmax = vmin + span;
        let region = Arc::new(ShmArena::<ControlRegion>::anonymous().unwrap());
        region.set_operational_state(OperationalState::SciBmcCalibrate);
        let mut store = CommandStore::new(
            Arc::clone(&region),
            Actuator::Bmc,
            SimulatedTransport::new(),
            vmin,
            vmax,
        );

        let mut candidate = ActuatorCommand::zeroed();
        for (i, v) in values.iter().enumerate() {
            candidate.act[i * (DM_NACT / 16)] = *v;
        }
        prop_assert!(store.try_submit(&candidate, ProcessId::Sci).is_ok());
        prop_assert!(store.get_command().is_within(vmin, vmax));
        prop_assert!(store.transport().last_sent().unwrap().is_within(vmin, vmax));
    }

    #[test]
    fn poke_sweep_round_trip(
        nact in 1usize..12,
        k in 1u32..4,
        starts in prop::collection::vec(0.0f64..100.0, 12),
    ) {
        let mut eng = engine(nact, k, 5.0);
        let mut base = ActuatorCommand::zeroed();
        base.act[..starts.len()].copy_from_slice(&starts);
        let now = Instant::now();
        let mut poked = vec![0u32; nact];
        let total = 2 * nact * k as usize;

        for tick in 0..total {
            let (out, info) = eng.advance_calibration(CalibrationMode::Poke, false, &base, now);
            prop_assert_eq!(info.mode, CalibrationMode::Poke);
            prop_assert_eq!(info.completed, None);
            let diffs: Vec<_> = (0..DM_NACT).filter(|i| out.act[*i] != base.act[*i]).collect();
            let phase = tick / k as usize;
            if phase % 2 == 1 {
                prop_assert_eq!(diffs.len(), 1);
                prop_assert_eq!(diffs[0], phase / 2);
                prop_assert!((out.act[diffs[0]] - base.act[diffs[0]] - 5.0).abs() < 1e-9);
                poked[diffs[0]] += 1;
            } else {
                prop_assert!(diffs.is_empty());
            }
        }

        let (out, info) = eng.advance_calibration(CalibrationMode::Poke, false, &base, now);
        prop_assert_eq!(info.completed, Some(CalibrationMode::Poke));
        prop_assert_eq!(out, base);
        prop_assert!(poked.iter().all(|n| *n == k));

        // Finished runs stay idle until the request changes.
        let (out, info) = eng.advance_calibration(CalibrationMode::Poke, false, &base, now);
        prop_assert_eq!(info.mode, CalibrationMode::None);
        prop_assert_eq!(out, base);
    }

    #[test]
    fn rand_restores_start(nact in 1usize..32, k in 1u32..3) {
        let mut eng = engine(nact, k, 2.0);
        let base = ActuatorCommand::uniform(50.0);
        let now = Instant::now();
        for _ in 0..2 * k {
            let (out, _) = eng.advance_calibration(CalibrationMode::Rand, false, &base, now);
            prop_assert!(out.max_abs_diff(&base) <= 2.0);
        }
        let (out, info) = eng.advance_calibration(CalibrationMode::Rand, false, &base, now);
        prop_assert_eq!(info.completed, Some(CalibrationMode::Rand));
        prop_assert_eq!(out, base);
    }
}

#[test]
fn region_request_clears_on_completion() {
    let region = Arc::new(ShmArena::<ControlRegion>::anonymous().unwrap());
    region.request_calibration(CalibrationMode::Timer);
    let mut eng = engine(4, 1, 1.0);
    let base = ActuatorCommand::uniform(1.0);
    let t0 = Instant::now();

    let (_, tick) = eng.advance_calibration(region.requested_calibration(), false, &base, t0);
    region.report_calibration(tick.mode, tick.step, tick.completed);
    assert_eq!(region.calibration_status().0, CalibrationMode::Timer);
    assert_eq!(region.requested_calibration(), CalibrationMode::Timer);

    let later = t0 + Duration::from_millis(1500);
    let (_, tick) = eng.advance_calibration(region.requested_calibration(), false, &base, later);
    region.report_calibration(tick.mode, tick.step, tick.completed);
    assert_eq!(tick.completed, Some(CalibrationMode::Timer));
    assert_eq!(region.requested_calibration(), CalibrationMode::None);
    assert_eq!(region.calibration_status().0, CalibrationMode::None);
}
