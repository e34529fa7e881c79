//! Probe-cycle phase tracking.
//!
//! A cycle is five consecutive frames: phase 0 under the flat, phases 1..=4
//! under probes 0..=3. The command issued after the phase-`k` image carries
//! probe `k`, so the phase `k + 1` image is the one exposed under it. The
//! cycle restarts whenever a frame number is not the previous one plus one.

use dmc_common::consts::{NPROBE, NSTEP};
use tracing::debug;

use super::{FieldEstimate, FieldEstimator, ScienceImage};

/// Phase bookkeeping and the per-phase image buffer.
#[derive(Debug, Default)]
pub struct HowfsCycle {
    initialized: bool,
    start_frame: u64,
    last_frame: u64,
    ihowfs: usize,
    images: [Option<ScienceImage>; NSTEP],
}

/// Where an image landed in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseAssignment {
    pub ihowfs: usize,
    /// The cycle was restarted on this image.
    pub restarted: bool,
    /// This image completed a full, unbroken cycle.
    pub complete: bool,
}

impl HowfsCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase, defined only while the cycle is initialized.
    pub fn ihowfs(&self) -> Option<usize> {
        self.initialized.then_some(self.ihowfs)
    }

    /// Assign `image` to its phase and buffer it.
    pub fn assign(&mut self, image: ScienceImage) -> PhaseAssignment {
        let f = image.frame_number;
        let continuous = self.initialized && self.last_frame.checked_add(1) == Some(f);
        let restarted = !continuous;
        if restarted {
            if self.initialized {
                debug!(last = self.last_frame, frame = f, "frame gap; probe cycle restarted");
            }
            self.initialized = true;
            self.start_frame = f;
            self.images = Default::default();
        }
        self.ihowfs = ((f - self.start_frame) % NSTEP as u64) as usize;
        self.last_frame = f;
        self.images[self.ihowfs] = Some(image);

        let complete = self.ihowfs == NSTEP - 1 && self.images.iter().all(Option::is_some);
        PhaseAssignment {
            ihowfs: self.ihowfs,
            restarted,
            complete,
        }
    }

    /// Drop the buffer; the next image starts a new cycle at phase 0.
    pub fn invalidate(&mut self) {
        self.initialized = false;
        self.images = Default::default();
    }

    /// Buffered images in phase order, if all phases are present.
    pub fn images(&self) -> Option<[&ScienceImage; NSTEP]> {
        let images: Vec<&ScienceImage> = self
            .images
            .iter()
            .map(Option::as_ref)
            .collect::<Option<_>>()?;
        images.try_into().ok()
    }
}

/// Result of feeding one image to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct HowfsTick {
    /// Phase of the image just received.
    pub ihowfs: usize,
    /// Probe the stored image was exposed under; `None` for the flat phase.
    pub exposed_under: Option<usize>,
    /// Probe to command for the next exposure; `None` means the flat.
    pub probe_next: Option<usize>,
    /// Present only on the image that completes a cycle.
    pub estimate: Option<FieldEstimate>,
    pub restarted: bool,
}

/// Phase tracking plus field estimation.
pub struct HowfsController {
    cycle: HowfsCycle,
    estimator: FieldEstimator,
    completed: u64,
}

impl HowfsController {
    pub fn new(estimator: FieldEstimator) -> Self {
        Self {
            cycle: HowfsCycle::new(),
            estimator,
            completed: 0,
        }
    }

    /// Feed the next science image.
    pub fn on_image(&mut self, image: ScienceImage) -> HowfsTick {
        let phase = self.cycle.assign(image);
        let ihowfs = phase.ihowfs;

        let estimate = if phase.complete {
            self.cycle.images().map(|images| {
                self.completed += 1;
                self.estimator.estimate(&images)
            })
        } else {
            None
        };

        HowfsTick {
            ihowfs,
            exposed_under: ihowfs.checked_sub(1),
            probe_next: (ihowfs < NPROBE).then_some(ihowfs),
            estimate,
            restarted: phase.restarted,
        }
    }

    /// Discard the cycle in progress, e.g. after a command that was not
    /// the one this cycle expected.
    pub fn invalidate(&mut self) {
        self.cycle.invalidate();
    }

    pub fn cycle(&self) -> &HowfsCycle {
        &self.cycle
    }

    pub fn estimator(&self) -> &FieldEstimator {
        &self.estimator
    }

    /// Completed cycles since start.
    pub fn completed(&self) -> u64 {
        self.completed
    }
}
