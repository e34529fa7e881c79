//! Integration test: full dark-hole loop over one probe cycle.
//!
//! Validates: calibration load from storage → HOWFS estimate → EFC →
//! gain-scaled flat update → published command; flat persistence through
//! `DirectoryStorage`; a powered-off driver rejects without side effects.

use std::sync::Arc;
use std::time::Instant;

use dmc_common::dm::{Actuator, OperationalState};
use dmc_control_unit::config::{DmcConfig, load_config_from_str};
use dmc_control_unit::cycle::DarkHoleLoop;
use dmc_control_unit::error::Rejected;
use dmc_control_unit::howfs::ScienceImage;
use dmc_control_unit::storage::blob;
use dmc_control_unit::storage::{CalibrationData, CalibrationStorage, DirectoryStorage, MemoryStorage};
use dmc_control_unit::transport::SimulatedTransport;
use dmc_shared_memory::{ControlRegion, ShmArena};

const CONFIG: &str = r#"
[shared]
service_name = "dmc-loop-test"

[dm]
nact = 2

[howfs]
npix = 1
nband = 1
nactive = 2
gain = 0.5
"#;

/// Unit response matrices, identity control matrix, linear actuators at
/// 0.01 length units per volt, flat at 100 V.
fn seed(storage: &mut dyn CalibrationStorage) {
    fn put(s: &mut dyn CalibrationStorage, name: &str, v: &[f64]) {
        s.write_blob(name, &blob::encode_f64(v)).unwrap();
    }
    put(storage, blob::HOWFS_PROBES, &[0.0; 8]);
    put(storage, blob::HOWFS_RMATRIX0, &[1.0]);
    put(storage, blob::HOWFS_RMATRIX1, &[0.0]);
    put(storage, blob::HOWFS_IMATRIX0, &[0.0]);
    put(storage, blob::HOWFS_IMATRIX1, &[1.0]);
    put(storage, blob::EFC_MATRIX, &[1.0, 0.0, 0.0, 1.0]);
    put(storage, blob::DM_CAL_A, &[0.0, 0.0]);
    put(storage, blob::DM_CAL_B, &[0.01, 0.01]);
    put(storage, blob::DM_FLAT, &[100.0, 100.0]);
    put(storage, blob::SCI_REFMAX, &[1000.0]);
    storage
        .write_blob(blob::EFC_ACTIVE2FULL, &blob::encode_u32(&[0, 1]))
        .unwrap();
}

fn build(
    config: &DmcConfig,
    storage: &dyn CalibrationStorage,
) -> (DarkHoleLoop<SimulatedTransport>, Arc<ShmArena<ControlRegion>>) {
    let data = CalibrationData::load(storage, config.dims());
    assert!(data.missing.is_empty());
    let region = Arc::new(ShmArena::<ControlRegion>::anonymous().unwrap());
    region.set_operational_state(OperationalState::SciHowfsEfc);
    let dh = DarkHoleLoop::from_config(config, &data, Arc::clone(&region), SimulatedTransport::new());
    (dh, region)
}

/// One cycle whose pixel has real part 0.05 and imaginary part 0.
fn run_cycle(dh: &mut DarkHoleLoop<SimulatedTransport>, first_frame: u64) {
    let now = Instant::now();
    for (i, counts) in [500u16, 600, 500, 400, 500].into_iter().enumerate() {
        let out = dh.on_frame(ScienceImage::new(first_frame + i as u64, 1, vec![counts]), now);
        assert_eq!(out.submit, Ok(()));
    }
}

#[test]
fn one_cycle_moves_flat_and_publishes() {
    let config = load_config_from_str(CONFIG).unwrap();
    let mut storage = MemoryStorage::new();
    seed(&mut storage);
    let (mut dh, region) = build(&config, &storage);

    run_cycle(&mut dh, 100);

    // delta = 0.05 length → 5 V; gain 0.5 → 2.5 V on actuator 0 only.
    let flat = dh.flat().flat();
    assert!((flat.act[0] - 102.5).abs() < 1e-9);
    assert!((flat.act[1] - 100.0).abs() < 1e-12);
    let published = region.channel(Actuator::Bmc).command();
    assert!((published.act[0] - 102.5).abs() < 1e-9);

    let stats = dh.stats();
    assert_eq!(stats.frames, 5);
    assert_eq!(stats.completions, 1);
    assert_eq!(stats.efc_updates, 1);
    assert_eq!(stats.accepted, 5);
    assert_eq!(dh.flat().iterations(), 1);
}

#[test]
fn saved_flat_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from_str(CONFIG).unwrap();
    let mut storage = DirectoryStorage::new(dir.path());
    seed(&mut storage);

    let (mut dh, _region) = build(&config, &storage);
    run_cycle(&mut dh, 0);
    dh.flat_mut().save_flat(&mut storage).unwrap();

    let reloaded = CalibrationData::load(&storage, config.dims());
    let flat = reloaded.flat.unwrap();
    assert!((flat.act[0] - 102.5).abs() < 1e-9);

    run_cycle(&mut dh, 5);
    assert!((dh.flat().flat().act[0] - 105.0).abs() < 1e-9);
    dh.flat_mut().revert();
    assert!((dh.flat().flat().act[0] - 102.5).abs() < 1e-9);
}

#[test]
fn powered_off_driver_rejects_every_tick() {
    let config = load_config_from_str(CONFIG).unwrap();
    let mut storage = MemoryStorage::new();
    seed(&mut storage);
    let (mut dh, region) = build(&config, &storage);
    dh.store_mut().transport_mut().power_off();

    let now = Instant::now();
    for f in 0..5 {
        let out = dh.on_frame(ScienceImage::new(f, 1, vec![500]), now);
        assert_eq!(out.submit, Err(Rejected::NotReady));
    }
    let channel = region.channel(Actuator::Bmc);
    assert_eq!(channel.published_count(), 0);
    assert_eq!(channel.rejected_count(), 5);
    assert_eq!(dh.stats().rejected_not_ready, 5);
}
