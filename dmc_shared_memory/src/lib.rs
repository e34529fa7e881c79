//! # DMC Shared Memory
//!
//! Cross-process control region for the DMC processes: a typed mapping
//! (`ShmArena<T>`) over `/dev/shm` or an anonymous mapping, the
//! `ControlRegion` layout, a sequence counter for torn-read detection and a
//! non-blocking test-and-set lock.
//!
//! ```rust,no_run
//! use dmc_shared_memory::{ControlRegion, ShmArena};
//! use dmc::dm::{Actuator, OperationalState};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let region = ShmArena::<ControlRegion>::create("control")?;
//! region.set_operational_state(OperationalState::SciHowfsEfc);
//!
//! let observer = ShmArena::<ControlRegion>::attach("control")?;
//! let current = observer.channel(Actuator::Bmc).command();
//! # let _ = current;
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - Readers never block: `CommandChannel::snapshot` retries only while the
//!   slot it sampled is being rewritten, and the active slot never is.
//! - Writers must hold the channel's `TestAndSetLock`; `publish` takes the
//!   guard as proof.

#![warn(clippy::all)]

pub mod arena;
pub mod data;
pub mod error;
pub mod lock;
pub mod platform;
pub mod version;

pub use arena::{SharedLayout, ShmArena};
pub use data::*;
pub use error::{ShmError, ShmResult};
pub use lock::{LockGuard, TestAndSetLock};
pub use version::VersionCounter;

