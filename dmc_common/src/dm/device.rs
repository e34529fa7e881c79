//! Actuator driver status as reported by the transport.

use bitflags::bitflags;

bitflags! {
    /// Driver status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceFlags: u8 {
        /// Driver link is up and accepting frames.
        const READY      = 0x01;
        /// Driver logic is powered.
        const POWERED    = 0x02;
        /// High-voltage stage enabled.
        const HV_ENABLED = 0x04;
        /// Driver-reported fault latched.
        const FAULT      = 0x08;
    }
}

/// Driver health telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DeviceTelemetry {
    /// Supply rail [V].
    pub supply_v: f64,
    /// Board temperature [degC].
    pub temperature_c: f64,
    /// Frames successfully sent since power-up.
    pub frames_sent: u64,
}

/// Snapshot returned by `ActuatorTransport::status`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportStatus {
    pub flags: DeviceFlags,
    pub telemetry: DeviceTelemetry,
}

impl TransportStatus {
    #[inline]
    pub fn ready(&self) -> bool {
        self.flags.contains(DeviceFlags::READY) && !self.flags.contains(DeviceFlags::FAULT)
    }

    #[inline]
    pub fn powered(&self) -> bool {
        self.flags.contains(DeviceFlags::POWERED)
    }
}
