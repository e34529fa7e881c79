//! Error types for shared memory operations

use thiserror::Error;

/// Errors that can occur while creating or attaching a shared region
#[derive(Error, Debug)]
pub enum ShmError {
    /// Region already exists
    #[error("Region already exists: {name}")]
    AlreadyExists {
        /// Region name
        name: String,
    },

    /// Region not found
    #[error("Region not found: {name}")]
    NotFound {
        /// Region name
        name: String,
    },

    /// Header magic does not match
    #[error("Region {name} has invalid magic")]
    InvalidMagic {
        /// Region name
        name: String,
    },

    /// Payload layout hash does not match the attaching binary
    #[error("Region {name} layout mismatch: expected {expected:#010x}, found {found:#010x}")]
    LayoutMismatch {
        /// Region name
        name: String,
        /// Hash compiled into this binary
        expected: u32,
        /// Hash stored in the region header
        found: u32,
    },

    /// Mapping is too small or too large for the payload
    #[error("Invalid region size: {size} bytes")]
    InvalidSize {
        /// Observed size in bytes
        size: usize,
    },

    /// Mapping is not aligned for the payload type
    #[error("Memory alignment error: address {address:#x} not aligned to {alignment}")]
    AlignmentError {
        /// Memory address
        address: usize,
        /// Required alignment
        alignment: usize,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
