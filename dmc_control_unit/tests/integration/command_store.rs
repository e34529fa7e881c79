//! Integration test: Command Store arbitration across writers.
//!
//! Validates: the commander gate over every state/requester/actuator,
//! lock exclusivity between concurrent writers, and that readers never
//! observe a partially written command.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use dmc_common::consts::{DM_NACT, DM_NTEST};
use dmc_common::dm::{Actuator, ActuatorCommand, OperationalState, ProcessId, is_commander};
use dmc_control_unit::command::CommandStore;
use dmc_control_unit::error::Rejected;
use dmc_control_unit::transport::SimulatedTransport;
use dmc_shared_memory::{ControlRegion, ShmArena};

fn region() -> Arc<ShmArena<ControlRegion>> {
    Arc::new(ShmArena::<ControlRegion>::anonymous().unwrap())
}

fn store(
    region: &Arc<ShmArena<ControlRegion>>,
    actuator: Actuator,
    owner: u32,
) -> CommandStore<SimulatedTransport> {
    CommandStore::new(
        Arc::clone(region),
        actuator,
        SimulatedTransport::new(),
        0.0,
        200.0,
    )
    .with_owner_id(owner)
}

#[test]
fn commander_gate_over_all_states() {
    let region = region();
    for state in OperationalState::ALL {
        region.set_operational_state(state);
        for actuator in Actuator::ALL {
            let mut s = store(&region, actuator, 7);
            for requester in ProcessId::ALL {
                let before = s.snapshot().sequence;
                let result = s.try_submit(&ActuatorCommand::uniform(10.0), requester);
                if is_commander(state, requester, actuator) {
                    assert_eq!(result, Ok(()), "{state:?} {requester:?} {actuator:?}");
                    assert_eq!(s.snapshot().sequence, before + 1);
                } else {
                    assert_eq!(result, Err(Rejected::NotCommander));
                    assert_eq!(s.snapshot().sequence, before);
                }
            }
        }
    }
}

#[test]
fn exactly_one_commander_per_actuator_in_efc() {
    let region = region();
    region.set_operational_state(OperationalState::SciHowfsEfc);
    let mut bmc = store(&region, Actuator::Bmc, 1);
    let mut alp = store(&region, Actuator::Alp, 2);

    assert!(bmc.try_submit(&ActuatorCommand::uniform(1.0), ProcessId::Sci).is_ok());
    assert!(alp.try_submit(&ActuatorCommand::uniform(2.0), ProcessId::Lyt).is_ok());
    assert_eq!(
        bmc.try_submit(&ActuatorCommand::uniform(3.0), ProcessId::Lyt),
        Err(Rejected::NotCommander)
    );
    assert_eq!(bmc.get_command().act[0], 1.0);
    assert_eq!(alp.get_command().act[0], 2.0);
}

/// Submission `i` of `owner`: actuators and test points both encode it, so
/// a read mixing two submissions breaks `act + test == 201`.
fn tagged(owner: u32, i: usize, writes: usize) -> ActuatorCommand {
    let act = 1.0 + (owner as usize * writes + i) as f64 * 0.1;
    ActuatorCommand {
        act: [act; DM_NACT],
        test: [201.0 - act; DM_NTEST],
    }
}

#[test]
fn concurrent_writers_never_tear_reads() {
    const WRITES: usize = 500;

    let region = region();
    region.set_operational_state(OperationalState::SciHowfsEfc);
    let done = AtomicBool::new(false);

    let (accepted, busy) = thread::scope(|scope| {
        let writers: Vec<_> = [1u32, 2u32]
            .into_iter()
            .map(|owner| {
                let mut s = store(&region, Actuator::Bmc, owner);
                scope.spawn(move || {
                    let (mut ok, mut busy) = (0u64, 0u64);
                    for i in 0..WRITES {
                        match s.try_submit(&tagged(owner, i, WRITES), ProcessId::Sci) {
                            Ok(()) => ok += 1,
                            Err(Rejected::Busy) => busy += 1,
                            Err(other) => panic!("unexpected rejection {other:?}"),
                        }
                    }
                    (ok, busy)
                })
            })
            .collect();

        let reader = {
            let region = &region;
            let done = &done;
            scope.spawn(move || {
                let mut reads = 0u64;
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let cmd = region.channel(Actuator::Bmc).command();
                    let (act, test) = (cmd.act[0], cmd.test[0]);
                    assert!(cmd.act.iter().all(|v| *v == act), "torn actuator array");
                    assert!(cmd.test.iter().all(|v| *v == test), "torn test-point array");
                    let initial = act == 0.0 && test == 0.0;
                    assert!(
                        initial || (act + test - 201.0).abs() < 1e-9,
                        "actuators {act} and test points {test} from different submissions"
                    );
                    reads += 1;
                    if finished {
                        break reads;
                    }
                }
            })
        };

        let totals = writers
            .into_iter()
            .map(|w| w.join().unwrap())
            .fold((0, 0), |acc, (ok, busy)| (acc.0 + ok, acc.1 + busy));
        done.store(true, Ordering::Release);
        assert!(reader.join().unwrap() > 0);
        totals
    });

    let channel = region.channel(Actuator::Bmc);
    assert_eq!(accepted + busy, 2 * WRITES as u64);
    assert_eq!(channel.published_count(), accepted);
    assert_eq!(channel.rejected_count(), busy);
    assert_eq!(channel.snapshot().sequence, accepted);
    assert_eq!(channel.lock().owner(), None);
    let last = channel.command();
    assert!((last.act[0] + last.test[0] - 201.0).abs() < 1e-9);
}

#[test]
fn not_ready_leaves_store_unchanged() {
    let region = region();
    region.set_operational_state(OperationalState::SciBmcCalibrate);
    let mut s = store(&region, Actuator::Bmc, 3);
    s.try_submit(&ActuatorCommand::uniform(42.0), ProcessId::Sci)
        .unwrap();

    s.transport_mut().power_off();
    assert_eq!(
        s.try_submit(&ActuatorCommand::uniform(7.0), ProcessId::Sci),
        Err(Rejected::NotReady)
    );
    assert_eq!(s.get_command().act[0], 42.0);
    assert_eq!(s.transport().sent_count(), 1);
}
