//! Pairwise-probe field estimator.
//!
//! For band `b` and pixel `c`, with `p1..p4` the normalized intensities of
//! phases 1..=4:
//!
//! ```text
//! real = 0.25 · (R0[c,b]·(p1 − p3) + R1[c,b]·(p2 − p4))
//! imag = 0.25 · (I0[c,b]·(p1 − p3) + I1[c,b]·(p2 − p4))
//! ```
//!
//! A pixel is zero when its flat intensity is below threshold or any probe
//! image saturated it.

use dmc_common::consts::NSTEP;
use tracing::debug;

use super::{BandField, FieldEstimate, ScienceImage};
use crate::config::DmcConfig;
use crate::storage::CalibrationData;
use crate::storage::data::BandScale;

pub struct FieldEstimator {
    npix: usize,
    nband: usize,
    threshold: f64,
    saturation: u16,
    background: Vec<f64>,
    scales: Vec<BandScale>,
    rmatrix: [Vec<f64>; 2],
    imatrix: [Vec<f64>; 2],
}

impl FieldEstimator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        npix: usize,
        nband: usize,
        threshold: f64,
        saturation: u16,
        background: Vec<f64>,
        scales: Vec<BandScale>,
        rmatrix: [Vec<f64>; 2],
        imatrix: [Vec<f64>; 2],
    ) -> Self {
        Self {
            npix,
            nband,
            threshold,
            saturation,
            background,
            scales,
            rmatrix,
            imatrix,
        }
    }

    pub fn from_calibration(config: &DmcConfig, data: &CalibrationData) -> Self {
        Self::new(
            config.howfs.npix,
            config.howfs.nband,
            config.howfs.intensity_threshold,
            config.howfs.saturation,
            config.background(),
            data.scales.clone(),
            data.rmatrix.clone(),
            data.imatrix.clone(),
        )
    }

    /// Normalization in use for band `b`.
    pub fn scale(&self, b: usize) -> Option<BandScale> {
        self.scales.get(b).copied()
    }

    /// Estimate the field from a full cycle of images in phase order.
    pub fn estimate(&self, images: &[&ScienceImage; NSTEP]) -> FieldEstimate {
        let bands = (0..self.nband).map(|b| self.estimate_band(images, b)).collect();
        FieldEstimate { bands }
    }

    fn estimate_band(&self, images: &[&ScienceImage; NSTEP], b: usize) -> BandField {
        let scale = self.scales.get(b).map_or(1.0, |s| s.scale);
        let bg = self.background.get(b).copied().unwrap_or(0.0);
        debug!(band = b, scale, background = bg, "estimating band");

        let mut real = vec![0.0; self.npix];
        let mut imag = vec![0.0; self.npix];
        let raw_bands = (*images).map(|img| img.band(b));

        for c in 0..self.npix {
            let Some(raw) = pixel_series(&raw_bands, c) else {
                continue;
            };
            let norm = |v: u16| (f64::from(v) - bg) / scale;

            if norm(raw[0]) < self.threshold {
                continue;
            }
            if raw[1..].iter().any(|v| *v == self.saturation) {
                continue;
            }

            let d13 = norm(raw[1]) - norm(raw[3]);
            let d24 = norm(raw[2]) - norm(raw[4]);
            let idx = c * self.nband + b;
            real[c] = 0.25 * (self.rmatrix[0][idx] * d13 + self.rmatrix[1][idx] * d24);
            imag[c] = 0.25 * (self.imatrix[0][idx] * d13 + self.imatrix[1][idx] * d24);
        }
        BandField { real, imag }
    }
}

/// Raw counts of pixel `c` across all phases, if every image has it.
fn pixel_series(bands: &[&[u16]; NSTEP], c: usize) -> Option<[u16; NSTEP]> {
    let mut out = [0u16; NSTEP];
    for (dst, band) in out.iter_mut().zip(bands.iter()) {
        *dst = *band.get(c)?;
    }
    Some(out)
}
