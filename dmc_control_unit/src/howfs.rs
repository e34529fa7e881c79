//! Higher-order wavefront sensing and EFC.
//!
//! Data flow per completed probe cycle:
//!
//! ```text
//! images[0..5] ──► FieldEstimator ──► FieldEstimate ──► EfcSolver ──► length deltas
//!                                                                     │
//!                                             FlatUpdater ◄───────────┘
//! ```

pub mod cycle;
pub mod efc;
pub mod estimator;
pub mod flat;

pub use cycle::{HowfsController, HowfsCycle, HowfsTick};
pub use efc::{EfcSolution, EfcSolver, rescale_to_limit};
pub use estimator::FieldEstimator;
pub use flat::{FlatUpdate, FlatUpdater};

/// One science frame restricted to the dark-hole pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScienceImage {
    /// Camera frame counter.
    pub frame_number: u64,
    npix: usize,
    /// Raw counts, band-major: `pixels[b * npix + c]`.
    pixels: Vec<u16>,
}

impl ScienceImage {
    /// `pixels.len()` must be a multiple of `npix`.
    pub fn new(frame_number: u64, npix: usize, pixels: Vec<u16>) -> Self {
        debug_assert!(npix > 0 && pixels.len() % npix == 0);
        Self {
            frame_number,
            npix,
            pixels,
        }
    }

    pub fn npix(&self) -> usize {
        self.npix
    }

    pub fn nband(&self) -> usize {
        self.pixels.len() / self.npix.max(1)
    }

    /// Raw counts of band `b`; empty if the band is absent.
    pub fn band(&self, b: usize) -> &[u16] {
        self.pixels
            .get(b * self.npix..(b + 1) * self.npix)
            .unwrap_or(&[])
    }
}

/// Estimated field for one band.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BandField {
    pub real: Vec<f64>,
    pub imag: Vec<f64>,
}

/// Field estimate for all bands; recomputed every completed cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldEstimate {
    pub bands: Vec<BandField>,
}

impl FieldEstimate {
    /// Stacked vector `[real_b0, imag_b0, real_b1, imag_b1, ...]`.
    pub fn stacked(&self) -> Vec<f64> {
        self.bands
            .iter()
            .flat_map(|band| band.real.iter().chain(band.imag.iter()).copied())
            .collect()
    }
}
