//! Typed shared-memory arena.
//!
//! An `ShmArena<T>` maps `[RegionHeader | T]` and hands out `&T`. All
//! cross-process mutation goes through atomics and sequence-counted cells
//! inside `T`, so the arena itself only ever gives out shared references.

use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{Ordering, fence};

use dmc::shm::{RegionHeader, SHM_MAX_SIZE, region_path_name, struct_version_hash};
use memmap2::MmapMut;
use tracing::{debug, info, warn};

use crate::error::{ShmError, ShmResult};
use crate::platform;

const HEADER_SIZE: usize = core::mem::size_of::<RegionHeader>();

/// Types that may be placed in a mapped region.
///
/// # Safety
///
/// Implementors must be valid when every byte is zero, contain no pointers
/// or references, and confine cross-process mutation to atomics or cells
/// guarded by a [`VersionCounter`](crate::version::VersionCounter).
pub unsafe trait SharedLayout: Sync + 'static {}

/// Mapping of a region holding a `T`.
pub struct ShmArena<T: SharedLayout> {
    name: String,
    path: Option<PathBuf>,
    owner: bool,
    mmap: MmapMut,
    _marker: PhantomData<T>,
}

impl<T: SharedLayout> ShmArena<T> {
    /// Mapping size for `T` including the header, page aligned.
    pub fn mapping_size() -> usize {
        platform::page_align(HEADER_SIZE + core::mem::size_of::<T>())
    }

    /// Create a named region under `/dev/shm`.
    pub fn create(name: &str) -> ShmResult<Self> {
        Self::create_in(Path::new(platform::SHM_DIR), name)
    }

    /// Attach to a named region under `/dev/shm`.
    pub fn attach(name: &str) -> ShmResult<Self> {
        Self::attach_in(Path::new(platform::SHM_DIR), name)
    }

    /// Create a named region backed by a file in `dir`.
    ///
    /// The creating arena removes the file when dropped.
    pub fn create_in(dir: &Path, name: &str) -> ShmResult<Self> {
        let path = dir.join(region_path_name(name));
        let size = Self::mapping_size();
        if size > SHM_MAX_SIZE {
            return Err(ShmError::InvalidSize { size });
        }
        let mmap = platform::create_region_mmap(&path, size, true)?;
        let mut arena = Self::from_mmap(name.to_string(), Some(path), true, mmap)?;
        arena.write_header();
        info!(region = name, size, "created shared region");
        Ok(arena)
    }

    /// Attach to an existing region in `dir`, validating header and layout.
    pub fn attach_in(dir: &Path, name: &str) -> ShmResult<Self> {
        let path = dir.join(region_path_name(name));
        let mmap = platform::attach_region_mmap(&path)?;
        if mmap.len() < HEADER_SIZE + core::mem::size_of::<T>() {
            return Err(ShmError::InvalidSize { size: mmap.len() });
        }
        let arena = Self::from_mmap(name.to_string(), Some(path), false, mmap)?;
        arena.validate_header()?;
        debug!(region = name, creator = arena.header().creator_pid, "attached shared region");
        Ok(arena)
    }

    /// Process-private region; used for simulation and tests.
    pub fn anonymous() -> ShmResult<Self> {
        let mmap = platform::anonymous_mmap(Self::mapping_size())?;
        let mut arena = Self::from_mmap("anonymous".to_string(), None, true, mmap)?;
        arena.write_header();
        Ok(arena)
    }

    fn from_mmap(name: String, path: Option<PathBuf>, owner: bool, mmap: MmapMut) -> ShmResult<Self> {
        let address = mmap.as_ptr() as usize + HEADER_SIZE;
        let alignment = core::mem::align_of::<T>();
        if address % alignment != 0 {
            return Err(ShmError::AlignmentError { address, alignment });
        }
        Ok(Self {
            name,
            path,
            owner,
            mmap,
            _marker: PhantomData,
        })
    }

    fn write_header(&mut self) {
        let header = RegionHeader::for_type::<T>(platform::current_pid());
        // SAFETY: the mapping is at least HEADER_SIZE bytes and page aligned.
        unsafe { std::ptr::write(self.mmap.as_mut_ptr() as *mut RegionHeader, header) };
        fence(Ordering::Release);
    }

    fn validate_header(&self) -> ShmResult<()> {
        fence(Ordering::Acquire);
        let header = self.header();
        if !header.is_magic_valid() {
            return Err(ShmError::InvalidMagic {
                name: self.name.clone(),
            });
        }
        let expected = struct_version_hash::<T>();
        if header.version_hash != expected {
            return Err(ShmError::LayoutMismatch {
                name: self.name.clone(),
                expected,
                found: header.version_hash,
            });
        }
        Ok(())
    }

    /// Region header.
    pub fn header(&self) -> &RegionHeader {
        // SAFETY: the mapping starts with a RegionHeader and is page aligned.
        unsafe { &*(self.mmap.as_ptr() as *const RegionHeader) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this arena created the region.
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

impl<T: SharedLayout> Deref for ShmArena<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: size and alignment were checked at construction; T is
        // valid for the zero-filled or previously initialized bytes.
        unsafe { &*(self.mmap.as_ptr().add(HEADER_SIZE) as *const T) }
    }
}

impl<T: SharedLayout> Drop for ShmArena<T> {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        if let Some(path) = &self.path {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(region = %self.name, error = %e, "failed to remove shared region");
            }
        }
    }
}

// SAFETY: only `&T` is handed out and `T: Sync`.
unsafe impl<T: SharedLayout> Send for ShmArena<T> {}
unsafe impl<T: SharedLayout> Sync for ShmArena<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[repr(C, align(64))]
    struct Counter {
        value: AtomicU64,
    }

    unsafe impl SharedLayout for Counter {}

    #[repr(C, align(64))]
    struct Other {
        value: AtomicU64,
        more: [AtomicU64; 16],
    }

    unsafe impl SharedLayout for Other {}

    #[test]
    fn anonymous_arena_starts_zeroed() {
        let arena = ShmArena::<Counter>::anonymous().unwrap();
        assert_eq!(arena.value.load(Ordering::Relaxed), 0);
        assert!(arena.header().is_magic_valid());
    }

    #[test]
    fn attach_sees_creator_writes() {
        let dir = tempfile::tempdir().unwrap();
        let created = ShmArena::<Counter>::create_in(dir.path(), "counter").unwrap();
        let attached = ShmArena::<Counter>::attach_in(dir.path(), "counter").unwrap();
        created.value.store(99, Ordering::Release);
        assert_eq!(attached.value.load(Ordering::Acquire), 99);
        assert!(!attached.is_owner());
    }

    #[test]
    fn attach_rejects_layout_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let _created = ShmArena::<Other>::create_in(dir.path(), "layout").unwrap();
        let result = ShmArena::<Counter>::attach_in(dir.path(), "layout");
        assert!(matches!(result, Err(ShmError::LayoutMismatch { .. })));
    }

    #[test]
    fn attach_missing_region() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShmArena::<Counter>::attach_in(dir.path(), "missing");
        assert!(matches!(result, Err(ShmError::NotFound { .. })));
    }

    #[test]
    fn owner_removes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(region_path_name("gone"));
        {
            let _arena = ShmArena::<Counter>::create_in(dir.path(), "gone").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
