//! Sequence counter for torn-read detection.
//!
//! Odd values mean a write is in progress. A reader samples the counter,
//! copies the payload, and accepts the copy only if the counter is even and
//! unchanged afterwards.

use std::sync::atomic::{AtomicU64, Ordering, fence};

/// Even/odd sequence counter.
///
/// `#[repr(transparent)]` over `AtomicU64` so it can be placed directly in a
/// mapped region; an all-zero counter is a valid, stable counter.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct VersionCounter {
    counter: AtomicU64,
}

impl VersionCounter {
    /// Create a new version counter starting at 0 (even)
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Current version with acquire ordering
    #[inline]
    pub fn load(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Mark a write as started and return the odd in-progress value.
    ///
    /// A counter left odd by a writer that died mid-write stays odd; the
    /// next writer reuses that value instead of flipping it back to even.
    #[inline]
    pub fn begin_write(&self) -> u64 {
        let start = self.counter.load(Ordering::Relaxed) | 1;
        self.counter.store(start, Ordering::Relaxed);
        fence(Ordering::Release);
        start
    }

    /// Commit a write started with [`begin_write`](Self::begin_write).
    #[inline]
    pub fn end_write(&self, start: u64) -> u64 {
        let next = start.wrapping_add(1);
        self.counter.store(next, Ordering::Release);
        next
    }

    /// Returns true when a reader that sampled `before` saw a consistent copy.
    #[inline]
    pub fn validate(&self, before: u64) -> bool {
        fence(Ordering::Acquire);
        Self::is_stable(before) && self.counter.load(Ordering::Relaxed) == before
    }

    /// Check if version is stable (even)
    #[inline]
    pub const fn is_stable(version: u64) -> bool {
        version % 2 == 0
    }

    /// Check if version indicates write in progress (odd)
    #[inline]
    pub const fn is_writing(version: u64) -> bool {
        version % 2 == 1
    }
}
