//! Shared-memory layout primitives common to every DMC process.
//!
//! Each mapped region starts with a [`RegionHeader`]. The attaching side
//! validates the magic and the layout hash of the payload type before it
//! touches anything else in the mapping.

use static_assertions::const_assert_eq;

/// Magic bytes at offset 0 of every DMC region.
pub const DMC_SHM_MAGIC: [u8; 8] = *b"DMC_SHM\0";

/// Prefix prepended to region names under `/dev/shm`.
pub const SHM_NAME_PREFIX: &str = "dmc_";

/// CPU cache line size in bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Largest region a DMC process will map.
pub const SHM_MAX_SIZE: usize = 64 * 1024 * 1024;

/// Fixed 64-byte header placed before the payload of a region.
#[derive(Debug, Clone, Copy)]
#[repr(C, align(64))]
pub struct RegionHeader {
    /// Must equal [`DMC_SHM_MAGIC`].
    pub magic: [u8; 8],
    /// `struct_version_hash::<T>()` of the payload type.
    pub version_hash: u32,
    /// Pid of the process that created the region.
    pub creator_pid: u32,
    /// Payload size in bytes.
    pub payload_size: u64,
    pub _padding: [u8; 40],
}

const_assert_eq!(core::mem::size_of::<RegionHeader>(), CACHE_LINE_SIZE);
const_assert_eq!(core::mem::align_of::<RegionHeader>(), CACHE_LINE_SIZE);

impl RegionHeader {
    pub const fn new(version_hash: u32, creator_pid: u32, payload_size: u64) -> Self {
        Self {
            magic: DMC_SHM_MAGIC,
            version_hash,
            creator_pid,
            payload_size,
            _padding: [0u8; 40],
        }
    }

    /// Header describing payload type `T`.
    pub const fn for_type<T>(creator_pid: u32) -> Self {
        Self::new(
            struct_version_hash::<T>(),
            creator_pid,
            core::mem::size_of::<T>() as u64,
        )
    }

    #[inline]
    pub fn is_magic_valid(&self) -> bool {
        self.magic == DMC_SHM_MAGIC
    }
}

/// Layout hash derived from size and alignment of `T`.
///
/// Does not detect field reordering at identical size and alignment;
/// shared types are `#[repr(C)]` so field order is fixed by the source.
pub const fn struct_version_hash<T>() -> u32 {
    let size = core::mem::size_of::<T>() as u32;
    let align = core::mem::align_of::<T>() as u32;
    size.wrapping_mul(0x9E3779B9) ^ align.wrapping_mul(0x517CC1B7)
}

/// Full `/dev/shm` object name for a logical region name.
pub fn region_path_name(name: &str) -> String {
    format!("{SHM_NAME_PREFIX}{name}")
}
