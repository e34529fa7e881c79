//! Open-loop calibration sequences.
//!
//! The engine is advanced once per control tick by the commanding process
//! and may replace the candidate command with a perturbed one. Every run
//! starts and ends in `CalibrationMode::None` and restores the command that
//! was in force when it began.

pub mod engine;

pub use engine::{CalibrationEngine, CalibrationSettings, CalibrationTick};
