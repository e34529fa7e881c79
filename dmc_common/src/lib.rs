//! DMC Common Library
//!
//! Shared constants, value types, and configuration loading for the DMC
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Actuator counts, voltage limits, probe-cycle sizes
//! - [`dm`] - Actuator commands, operational state policy, calibration mode, device status
//! - [`shm`] - Shared-memory region header and layout hashing
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! dmc = { package = "dmc_common", path = "../dmc_common" }
//! ```

pub mod config;
pub mod consts;
pub mod dm;
pub mod prelude;
pub mod shm;
