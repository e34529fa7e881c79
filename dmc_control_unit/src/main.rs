//! # DMC Control Unit
//!
//! Dark-hole control loop for the coronagraph's high-order deformable
//! mirror.
//!
//! Two modes:
//! - **Simulate** (`--simulate`): anonymous control region in
//!   `SciHowfsEfc`, simulated actuator driver and a synthetic camera. Runs
//!   `--frames` ticks and prints the loop statistics.
//! - **Check** (default): attaches the supervisor's named control region,
//!   validates configuration and calibration blobs, evicts command locks
//!   held by dead writers and reports the region status. Hardware drivers and cameras plug in through
//!   `ActuatorTransport` and `ScienceImage`.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use dmc_common::config::LogLevel;
use dmc_common::consts::{DEFAULT_CONFIG_PATH, DEFAULT_REGION_NAME};
use dmc_common::dm::{Actuator, OperationalState};
use dmc_control_unit::config::{DmcConfig, load_config};
use dmc_control_unit::cycle::DarkHoleLoop;
use dmc_control_unit::error::StartupError;
use dmc_control_unit::simulation::SyntheticCamera;
use dmc_control_unit::storage::data::validate_structure;
use dmc_control_unit::storage::{CalibrationData, DirectoryStorage};
use dmc_control_unit::transport::SimulatedTransport;
use dmc_shared_memory::{ControlRegion, ShmArena, platform};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// DMC Control Unit: HOWFS/EFC dark-hole loop
#[derive(Parser, Debug)]
#[command(name = "dmc_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Deformable-mirror command arbitration, calibration and dark-hole control")]
struct Args {
    /// Path to the control unit configuration TOML.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Name of the shared control region (under /dev/shm, prefixed `dmc_`).
    #[arg(long, default_value = DEFAULT_REGION_NAME)]
    shm_name: String,

    /// Run against a simulated driver and synthetic camera.
    #[arg(long)]
    simulate: bool,

    /// Frames to process in simulate mode.
    #[arg(long, default_value_t = 100)]
    frames: u64,

    /// Persist the resulting flat after a simulate run.
    #[arg(long, requires = "simulate")]
    save_flat: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs (and the final statistics) in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("DMC Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(StartupError::from)
        .and_then(|config| run(&args, &config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("DMC Control Unit shutdown complete");
}

fn run(args: &Args, config: &DmcConfig) -> Result<(), StartupError> {
    info!(
        service = %config.shared.service_name,
        nact = config.dm.nact,
        npix = config.howfs.npix,
        nband = config.howfs.nband,
        nactive = config.howfs.nactive,
        "config OK"
    );

    let storage = DirectoryStorage::new(&config.storage.directory);
    let dims = config.dims();
    validate_structure(&storage, dims)?;
    let data = CalibrationData::load(&storage, dims);
    if !data.missing.is_empty() {
        warn!(
            missing = data.missing.len(),
            "running with zeroed calibration for missing blobs"
        );
    }

    if args.simulate {
        simulate(args, config, &data, storage)
    } else {
        check(args)
    }
}

fn simulate(
    args: &Args,
    config: &DmcConfig,
    data: &CalibrationData,
    mut storage: DirectoryStorage,
) -> Result<(), StartupError> {
    let region = Arc::new(ShmArena::<ControlRegion>::anonymous()?);
    region.set_operational_state(OperationalState::SciHowfsEfc);

    let mut dh = DarkHoleLoop::from_config(config, data, region, SimulatedTransport::new());
    let camera = SyntheticCamera::new(
        config.howfs.npix,
        config.howfs.nband,
        config.calibration.rand_seed,
    );

    info!(frames = args.frames, "simulation started");
    for image in camera.take(usize::try_from(args.frames).unwrap_or(usize::MAX)) {
        dh.on_frame(image, Instant::now());
    }

    let stats = dh.stats();
    info!(
        frames = stats.frames,
        completions = stats.completions,
        efc_updates = stats.efc_updates,
        accepted = stats.accepted,
        rejected = stats.rejected(),
        avg_tick_ns = stats.avg_tick_ns(),
        max_tick_ns = stats.max_tick_ns,
        "simulation finished"
    );
    if args.json {
        match serde_json::to_string(stats) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("could not serialize loop statistics: {e}"),
        }
    }

    if args.save_flat {
        dh.flat_mut().save_flat(&mut storage)?;
    }
    Ok(())
}

fn check(args: &Args) -> Result<(), StartupError> {
    let region = ShmArena::<ControlRegion>::attach(&args.shm_name)?;
    let (mode, step) = region.calibration_status();
    for actuator in Actuator::ALL {
        let channel = region.channel(actuator);
        if let Some(pid) = channel.lock().break_if_stale(platform::process_alive) {
            warn!(?actuator, pid, "evicted command lock of dead writer");
        }
        let snapshot = channel.snapshot();
        info!(
            ?actuator,
            sequence = snapshot.sequence,
            publisher = snapshot.publisher_pid,
            lock_owner = ?channel.lock().owner(),
            published = channel.published_count(),
            rejected = channel.rejected_count(),
            "command channel"
        );
    }
    info!(
        region = region.name(),
        state = ?region.operational_state(),
        calibration = mode.name(),
        step,
        "control region attached; no hardware transport linked"
    );
    Ok(())
}

/// Filter directive: `-v` forces debug, otherwise the configured level.
fn log_directive(verbose: bool, configured: LogLevel) -> &'static str {
    if verbose {
        LogLevel::Debug.as_directive()
    } else {
        configured.as_directive()
    }
}

fn setup_tracing(args: &Args, configured: LogLevel) {
    let directive = log_directive(args.verbose, configured);
    // RUST_LOG, when set, takes precedence over the config file.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
