//! One file per blob under a directory.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::CalibrationStorage;
use crate::error::StorageError;

/// Blobs stored as `<dir>/<name>.bin`.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.bin"))
    }
}

impl CalibrationStorage for DirectoryStorage {
    fn read_blob(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.path_for(name)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                name: name.to_string(),
            },
            _ => StorageError::Io {
                name: name.to_string(),
                source: e,
            },
        })
    }

    /// Write to a temporary file, then rename over the target.
    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            name: name.to_string(),
            source,
        };
        let target = self.path_for(name);
        let tmp = self.root.join(format!(".{name}.bin.tmp"));

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &target).map_err(io_err)?;
        debug!(blob = name, bytes = bytes.len(), "wrote calibration blob");
        Ok(())
    }
}
