//! Cross-process control region.
//!
//! One `ControlRegion` is shared by every DMC process. It holds, per
//! actuator, the last command accepted by hardware (double buffered, each
//! buffer sequence-counted) and the write lock; plus the operational state
//! set by the supervisor and the calibration request/report words.

use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use dmc::dm::{Actuator, ActuatorCommand, CalibrationMode, DeviceTelemetry, OperationalState};
use static_assertions::const_assert_eq;

use crate::arena::SharedLayout;
use crate::lock::{LockGuard, TestAndSetLock};
use crate::version::VersionCounter;

/// Record published after a successful transport send.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct PublishedCommand {
    /// Command as sent to the driver (already clamped).
    pub command: ActuatorCommand,
    /// Driver telemetry sampled with the send.
    pub telemetry: DeviceTelemetry,
    /// Publish count for this actuator, starting at 1.
    pub sequence: u64,
    /// Pid of the publishing process.
    pub publisher_pid: u32,
    pub _reserved: u32,
}

#[repr(C, align(64))]
struct Slot {
    version: VersionCounter,
    record: UnsafeCell<PublishedCommand>,
}

// SAFETY: the cell is only written under the channel lock and only read
// through the version check.
unsafe impl Sync for Slot {}

impl Slot {
    /// Consistent copy, or `None` if a write overlapped the read.
    fn try_read(&self) -> Option<PublishedCommand> {
        let before = self.version.load();
        if VersionCounter::is_writing(before) {
            return None;
        }
        // SAFETY: torn copies are discarded by the version check below.
        let record = unsafe { std::ptr::read_volatile(self.record.get()) };
        self.version.validate(before).then_some(record)
    }

    fn write(&self, record: &PublishedCommand) {
        let start = self.version.begin_write();
        // SAFETY: callers hold the channel lock, so this is the only writer.
        unsafe { std::ptr::write_volatile(self.record.get(), *record) };
        self.version.end_write(start);
    }
}

/// Command store for one actuator.
///
/// Writers hold the lock, fill the inactive slot and then flip `active`.
/// The active slot is never written, so readers always find a stable copy
/// even if a writer dies halfway through.
#[repr(C, align(64))]
pub struct CommandChannel {
    slots: [Slot; 2],
    active: AtomicU32,
    lock: TestAndSetLock,
    published: AtomicU64,
    rejected: AtomicU64,
}

impl CommandChannel {
    /// Last published record. Never blocks on a writer.
    pub fn snapshot(&self) -> PublishedCommand {
        loop {
            let idx = (self.active.load(Ordering::Acquire) & 1) as usize;
            if let Some(record) = self.slots[idx].try_read() {
                return record;
            }
            spin_loop();
        }
    }

    /// Last applied command.
    #[inline]
    pub fn command(&self) -> ActuatorCommand {
        self.snapshot().command
    }

    pub fn lock(&self) -> &TestAndSetLock {
        &self.lock
    }

    /// Publish a command the driver accepted. Requires the channel lock.
    pub fn publish(
        &self,
        guard: &LockGuard<'_>,
        command: &ActuatorCommand,
        telemetry: DeviceTelemetry,
    ) -> u64 {
        let sequence = self.published.load(Ordering::Relaxed) + 1;
        let record = PublishedCommand {
            command: *command,
            telemetry,
            sequence,
            publisher_pid: guard.owner(),
            _reserved: 0,
        };
        let next = (self.active.load(Ordering::Relaxed) & 1) ^ 1;
        self.slots[next as usize].write(&record);
        self.active.store(next, Ordering::Release);
        self.published.store(sequence, Ordering::Release);
        sequence
    }

    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Calibration request and progress words.
#[repr(C, align(64))]
struct CalibrationControl {
    requested: AtomicU8,
    reported: AtomicU8,
    reset: AtomicBool,
    step: AtomicU64,
}

/// The shared control region.
#[repr(C, align(64))]
pub struct ControlRegion {
    channels: [CommandChannel; 2],
    state: AtomicU8,
    calibration: CalibrationControl,
}

// SAFETY: every field is an atomic or a sequence-counted cell, and all-zero
// bytes decode as Standby with no calibration and empty slots.
unsafe impl SharedLayout for ControlRegion {}

const_assert_eq!(core::mem::align_of::<ControlRegion>(), 64);
const_assert_eq!(core::mem::size_of::<ControlRegion>() % 64, 0);

impl ControlRegion {
    pub fn channel(&self, actuator: Actuator) -> &CommandChannel {
        &self.channels[actuator as usize]
    }

    /// Operational state; an unknown byte reads as `Standby`.
    pub fn operational_state(&self) -> OperationalState {
        OperationalState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Supervisor-only.
    pub fn set_operational_state(&self, state: OperationalState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn requested_calibration(&self) -> CalibrationMode {
        CalibrationMode::from_u8(self.calibration.requested.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    pub fn request_calibration(&self, mode: CalibrationMode) {
        self.calibration
            .requested
            .store(mode as u8, Ordering::Release);
    }

    /// Set the reset flag; consumed by the next calibration tick.
    pub fn request_calibration_reset(&self) {
        self.calibration.reset.store(true, Ordering::Release);
    }

    /// Read and clear the reset flag.
    pub fn take_calibration_reset(&self) -> bool {
        self.calibration.reset.swap(false, Ordering::AcqRel)
    }

    /// Report the engine's mode and step after a tick.
    ///
    /// When a run finished (`mode == None`) while `finished` was still the
    /// requested mode, the request is cleared too. A request changed by
    /// someone else in the meantime is left alone.
    pub fn report_calibration(&self, mode: CalibrationMode, step: u64, finished: Option<CalibrationMode>) {
        self.calibration.reported.store(mode as u8, Ordering::Release);
        self.calibration.step.store(step, Ordering::Release);
        if let Some(done) = finished {
            let _ = self.calibration.requested.compare_exchange(
                done as u8,
                CalibrationMode::None as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }

    /// Engine mode and step as last reported.
    pub fn calibration_status(&self) -> (CalibrationMode, u64) {
        let mode = CalibrationMode::from_u8(self.calibration.reported.load(Ordering::Acquire))
            .unwrap_or_default();
        (mode, self.calibration.step.load(Ordering::Acquire))
    }
}
