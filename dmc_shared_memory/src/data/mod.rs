//! Shared region layouts.

pub mod control;

pub use control::{CommandChannel, ControlRegion, PublishedCommand};
