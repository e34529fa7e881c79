//! Command processing root.
//!
//! Commander arbitration and the shared Command Store.

pub mod arbitration;
pub mod store;

pub use store::CommandStore;
