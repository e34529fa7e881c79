//! System-wide constants for the DMC workspace.
//!
//! Single source of truth for actuator counts, voltage limits and HOWFS
//! phase counts. Everything compiled into the shared region layout lives
//! here; runtime dimensions (pixels, bands, active actuators) come from
//! configuration.

/// Number of physical actuators on the high-order deformable mirror.
pub const DM_NACT: usize = 952;

/// Number of driver test points carried with every actuator command.
pub const DM_NTEST: usize = 8;

/// Lowest voltage the driver accepts [V].
pub const DM_VMIN: f64 = 0.0;

/// Highest voltage the driver accepts [V].
pub const DM_VMAX: f64 = 200.0;

/// Number of phase-diverse probe patterns per HOWFS cycle.
pub const NPROBE: usize = 4;

/// Number of phases per HOWFS cycle (one flat + `NPROBE` probes).
pub const NSTEP: usize = NPROBE + 1;

/// Science camera saturation value (16-bit ADC full scale).
pub const SCI_SATURATION: u16 = u16::MAX;

/// Fallback intensity normalization when no reference maximum was measured [counts].
pub const DEFAULT_INTENSITY_SCALE: f64 = 10_000.0;

/// Upper bound on science bands in one HOWFS image.
pub const MAX_BANDS: usize = 16;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dmc/dmc.toml";

/// Default calibration blob directory.
pub const DEFAULT_CALIBRATION_DIR: &str = "/var/lib/dmc/calibration";

/// Default shared control region name.
pub const DEFAULT_REGION_NAME: &str = "control";
