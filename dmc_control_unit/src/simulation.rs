//! Synthetic science camera for `--simulate` runs and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::howfs::ScienceImage;

/// Produces dark-hole frames with uniformly distributed counts.
pub struct SyntheticCamera {
    npix: usize,
    nband: usize,
    floor: u16,
    ceiling: u16,
    next_frame: u64,
    rng: StdRng,
}

impl SyntheticCamera {
    pub fn new(npix: usize, nband: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            npix,
            nband,
            floor: 0,
            ceiling: 1000,
            next_frame: 0,
            rng,
        }
    }

    /// Count range `[floor, ceiling]` of generated pixels.
    pub fn with_counts(mut self, floor: u16, ceiling: u16) -> Self {
        self.floor = floor.min(ceiling);
        self.ceiling = ceiling.max(floor);
        self
    }

    /// Skip `n` frame numbers, as a camera that dropped frames would.
    pub fn drop_frames(&mut self, n: u64) {
        self.next_frame += n;
    }

    pub fn next_image(&mut self) -> ScienceImage {
        let (floor, ceiling) = (self.floor, self.ceiling);
        let pixels = (0..self.npix * self.nband)
            .map(|_| self.rng.gen_range(floor..=ceiling))
            .collect();
        let image = ScienceImage::new(self.next_frame, self.npix, pixels);
        self.next_frame += 1;
        image
    }
}

impl Iterator for SyntheticCamera {
    type Item = ScienceImage;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_consecutive_until_dropped() {
        let mut cam = SyntheticCamera::new(3, 2, Some(1)).with_counts(10, 20);
        let a = cam.next_image();
        let b = cam.next_image();
        cam.drop_frames(2);
        let c = cam.next_image();
        assert_eq!((a.frame_number, b.frame_number, c.frame_number), (0, 1, 4));
        assert_eq!(a.nband(), 2);
        assert!(a.band(1).iter().all(|v| (10..=20).contains(v)));
    }

    #[test]
    fn seed_reproduces_counts() {
        let a: Vec<_> = SyntheticCamera::new(4, 1, Some(9)).take(3).collect();
        let b: Vec<_> = SyntheticCamera::new(4, 1, Some(9)).take(3).collect();
        assert_eq!(a, b);
    }
}
