//! Calibration blob storage.
//!
//! The control core reads its calibration once at startup through the
//! [`CalibrationStorage`] seam and writes back only the flat command.

pub mod blob;
pub mod data;
pub mod directory;
pub mod memory;

pub use data::CalibrationData;
pub use directory::DirectoryStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;

/// Named byte-blob store.
pub trait CalibrationStorage {
    fn read_blob(&self, name: &str) -> Result<Vec<u8>, StorageError>;
    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
}
