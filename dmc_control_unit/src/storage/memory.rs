//! In-memory blob store for simulation and tests.

use std::collections::HashMap;

use super::CalibrationStorage;
use super::blob::{encode_f64, encode_u32};
use crate::error::StorageError;

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.blobs.insert(name.to_string(), bytes);
    }

    pub fn insert_f64(&mut self, name: &str, values: &[f64]) {
        self.insert(name, encode_f64(values));
    }

    pub fn insert_u32(&mut self, name: &str, values: &[u32]) {
        self.insert(name, encode_u32(values));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }
}

impl CalibrationStorage for MemoryStorage {
    fn read_blob(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
            })
    }

    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.insert(name, bytes.to_vec());
        Ok(())
    }
}
