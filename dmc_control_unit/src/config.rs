//! TOML configuration with bounds validation.
//!
//! ```toml
//! [shared]
//! service_name = "dmc-sci"
//!
//! [dm]
//! vmax = 180.0
//!
//! [calibration]
//! images_per_step = 4
//! poke_volts = 10.0
//!
//! [howfs]
//! npix = 1024
//! nband = 3
//! nactive = 900
//! gain = 0.5
//! max_delta = 0.02
//!
//! [storage]
//! directory = "/var/lib/dmc/calibration"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use dmc_common::config::{ConfigError, ConfigLoader, SharedConfig};
use dmc_common::consts::{
    DEFAULT_CALIBRATION_DIR, DM_NACT, DM_VMAX, DM_VMIN, MAX_BANDS, SCI_SATURATION,
};
use heapless::Vec as FixedVec;
use serde::{Deserialize, Serialize};

// ─── Defaults ───────────────────────────────────────────────────────

const fn default_nact() -> usize {
    DM_NACT
}
const fn default_vmin() -> f64 {
    DM_VMIN
}
const fn default_vmax() -> f64 {
    DM_VMAX
}
const fn default_images_per_step() -> u32 {
    1
}
const fn default_poke_volts() -> f64 {
    5.0
}
const fn default_timer_seconds() -> f64 {
    10.0
}
const fn default_gain() -> f64 {
    0.5
}
const fn default_threshold() -> f64 {
    1e-6
}
const fn default_saturation() -> u16 {
    SCI_SATURATION
}
fn default_calibration_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CALIBRATION_DIR)
}

// ─── Sections ───────────────────────────────────────────────────────

/// `[dm]`: mirror geometry and voltage range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmConfig {
    /// Physical actuators in use (`<= DM_NACT`).
    #[serde(default = "default_nact")]
    pub nact: usize,
    /// Lower clamp [V]; may narrow but never widen the driver range.
    #[serde(default = "default_vmin")]
    pub vmin: f64,
    /// Upper clamp [V].
    #[serde(default = "default_vmax")]
    pub vmax: f64,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            nact: DM_NACT,
            vmin: DM_VMIN,
            vmax: DM_VMAX,
        }
    }
}

/// `[calibration]`: open-loop calibration sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Images held per calibration step (K).
    #[serde(default = "default_images_per_step")]
    pub images_per_step: u32,
    /// POKE amplitude and RAND scale [V].
    #[serde(default = "default_poke_volts")]
    pub poke_volts: f64,
    /// TIMER duration [s].
    #[serde(default = "default_timer_seconds")]
    pub timer_seconds: f64,
    /// Fixed RAND seed; entropy when absent.
    #[serde(default)]
    pub rand_seed: Option<u64>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            images_per_step: default_images_per_step(),
            poke_volts: default_poke_volts(),
            timer_seconds: default_timer_seconds(),
            rand_seed: None,
        }
    }
}

impl CalibrationConfig {
    pub fn timer_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timer_seconds)
    }
}

/// `[howfs]`: dark-hole dimensions and EFC tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HowfsConfig {
    /// Dark-hole pixels per band.
    pub npix: usize,
    /// Spectral bands.
    pub nband: usize,
    /// Actuators in the control matrix.
    pub nactive: usize,
    /// Fraction of each EFC voltage step folded into the flat.
    #[serde(default = "default_gain")]
    pub gain: f64,
    /// Largest allowed single-step length delta; uniform rescale above it.
    #[serde(default)]
    pub max_delta: Option<f64>,
    /// Minimum normalized flat intensity for a pixel to be estimated.
    #[serde(default = "default_threshold")]
    pub intensity_threshold: f64,
    /// Raw count reported by a saturated pixel.
    #[serde(default = "default_saturation")]
    pub saturation: u16,
    /// Per-band bias [counts]; empty means zero.
    #[serde(default)]
    pub background: FixedVec<f64, MAX_BANDS>,
}

/// `[storage]`: calibration blob location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_calibration_dir")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_calibration_dir(),
        }
    }
}

/// Complete control-unit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmcConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub dm: DmConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    pub howfs: HowfsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Runtime array dimensions derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims {
    pub nact: usize,
    pub npix: usize,
    pub nband: usize,
    pub nactive: usize,
}

impl Dims {
    /// Rows of the control matrix: real and imaginary parts of every pixel in every band.
    pub const fn field_len(&self) -> usize {
        2 * self.npix * self.nband
    }
}

impl DmcConfig {
    pub fn dims(&self) -> Dims {
        Dims {
            nact: self.dm.nact,
            npix: self.howfs.npix,
            nband: self.howfs.nband,
            nactive: self.howfs.nactive,
        }
    }

    /// Per-band background, padded with zeros to `nband`.
    pub fn background(&self) -> Vec<f64> {
        let mut bg = vec![0.0; self.howfs.nband];
        for (dst, src) in bg.iter_mut().zip(self.howfs.background.iter()) {
            *dst = *src;
        }
        bg
    }

    /// Check parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let fail = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.dm.nact == 0 || self.dm.nact > DM_NACT {
            return fail(format!("dm.nact must be in 1..={DM_NACT}, got {}", self.dm.nact));
        }
        if !(self.dm.vmin < self.dm.vmax) {
            return fail(format!(
                "dm.vmin ({}) must be below dm.vmax ({})",
                self.dm.vmin, self.dm.vmax
            ));
        }
        if self.dm.vmin < DM_VMIN || self.dm.vmax > DM_VMAX {
            return fail(format!(
                "dm voltage range [{}, {}] exceeds driver range [{DM_VMIN}, {DM_VMAX}]",
                self.dm.vmin, self.dm.vmax
            ));
        }

        let cal = &self.calibration;
        if cal.images_per_step == 0 {
            return fail("calibration.images_per_step must be at least 1".into());
        }
        if !cal.poke_volts.is_finite() || cal.poke_volts < 0.0 {
            return fail(format!("calibration.poke_volts invalid: {}", cal.poke_volts));
        }
        if !cal.timer_seconds.is_finite() || cal.timer_seconds < 0.0 {
            return fail(format!(
                "calibration.timer_seconds invalid: {}",
                cal.timer_seconds
            ));
        }

        let h = &self.howfs;
        if h.npix == 0 {
            return fail("howfs.npix must be positive".into());
        }
        if h.nband == 0 || h.nband > MAX_BANDS {
            return fail(format!("howfs.nband must be in 1..={MAX_BANDS}, got {}", h.nband));
        }
        if h.nactive == 0 || h.nactive > self.dm.nact {
            return fail(format!(
                "howfs.nactive must be in 1..={}, got {}",
                self.dm.nact, h.nactive
            ));
        }
        if !(h.gain > 0.0 && h.gain <= 1.0) {
            return fail(format!("howfs.gain must be in (0, 1], got {}", h.gain));
        }
        if let Some(limit) = h.max_delta {
            if !(limit > 0.0 && limit.is_finite()) {
                return fail(format!("howfs.max_delta must be positive, got {limit}"));
            }
        }
        if !h.background.is_empty() && h.background.len() != h.nband {
            return fail(format!(
                "howfs.background has {} entries for {} bands",
                h.background.len(),
                h.nband
            ));
        }
        Ok(())
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<DmcConfig, ConfigError> {
    let config = DmcConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate configuration from a TOML string.
pub fn load_config_from_str(text: &str) -> Result<DmcConfig, ConfigError> {
    let config: DmcConfig =
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────
