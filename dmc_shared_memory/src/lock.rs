//! Non-blocking test-and-set lock that lives inside a shared region.
//!
//! The lock word holds the owner's pid (0 = free). Acquisition never waits:
//! a contended `try_acquire` returns `None` and the caller skips its write.

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;

/// Test-and-set flag storing the owner pid.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct TestAndSetLock {
    owner: AtomicU32,
}

impl TestAndSetLock {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU32::new(0),
        }
    }

    /// Take the lock for `pid` if it is free.
    ///
    /// `pid` must be non-zero.
    pub fn try_acquire(&self, pid: u32) -> Option<LockGuard<'_>> {
        debug_assert!(pid != 0);
        self.owner
            .compare_exchange(0, pid, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| LockGuard { lock: self })
    }

    /// Current owner pid, if held.
    pub fn owner(&self) -> Option<u32> {
        match self.owner.load(Ordering::Acquire) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Clear the lock if its owner is no longer alive.
    ///
    /// Returns the pid that was evicted.
    pub fn break_if_stale(&self, is_alive: impl Fn(u32) -> bool) -> Option<u32> {
        let pid = self.owner()?;
        if is_alive(pid) {
            return None;
        }
        self.owner
            .compare_exchange(pid, 0, Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            .inspect(|pid| warn!(pid, "released lock held by dead process"))
    }
}

/// Releases the lock on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a TestAndSetLock,
}

impl LockGuard<'_> {
    pub fn owner(&self) -> u32 {
        self.lock.owner.load(Ordering::Relaxed)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.owner.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let lock = TestAndSetLock::new();
        let guard = lock.try_acquire(10).unwrap();
        assert_eq!(guard.owner(), 10);
        assert!(lock.try_acquire(11).is_none());
        drop(guard);
        assert!(lock.owner().is_none());
        assert!(lock.try_acquire(11).is_some());
    }

    #[test]
    fn stale_owner_is_evicted() {
        let lock = TestAndSetLock::new();
        std::mem::forget(lock.try_acquire(77));
        assert_eq!(lock.break_if_stale(|_| true), None);
        assert_eq!(lock.break_if_stale(|_| false), Some(77));
        assert!(lock.owner().is_none());
    }
}
