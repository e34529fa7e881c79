//! # DMC Control Unit Library
//!
//! Real-time control core of the coronagraph's deformable mirrors. Every
//! science frame runs one tick of the dark-hole loop: probe-cycle tracking,
//! field estimation, electric-field conjugation, flat update, calibration
//! override and an arbitrated write to the shared Command Store.
//!
//! ## Layers
//!
//! 1. **command**: commander gate and the lock-protected Command Store
//! 2. **calibration**: open-loop TIMER / POKE / RAND / PROBE sequences
//! 3. **howfs**: HOWFS phase tracking, field estimator, EFC, flat updater
//! 4. **cycle**: per-frame orchestration (`DarkHoleLoop`)
//!
//! Hardware is reached only through [`transport::ActuatorTransport`] and
//! calibration blobs only through [`storage::CalibrationStorage`].

pub mod calibration;
pub mod command;
pub mod config;
pub mod cycle;
pub mod error;
pub mod howfs;
pub mod model;
pub mod simulation;
pub mod storage;
pub mod transport;
