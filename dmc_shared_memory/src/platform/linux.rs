//! Linux-specific shared memory operations

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{Pid, getpid};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Directory backing POSIX shared memory objects.
pub const SHM_DIR: &str = "/dev/shm";

/// System page size in bytes.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

/// Round `size` up to a whole number of pages.
pub fn page_align(size: usize) -> usize {
    let page = page_size();
    size.div_ceil(page) * page
}

/// Create a new file-backed mapping at `path`; fails if it exists.
pub fn create_region_mmap(path: &Path, size: usize, populate: bool) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ShmError::AlreadyExists {
                name: path.display().to_string(),
            },
            _ => ShmError::from(e),
        })?;

    file.set_len(size as u64)?;

    let mut options = MmapOptions::new();
    if populate {
        options.populate();
    }
    // SAFETY: the file was just created with exclusive access and sized above.
    let mmap = unsafe { options.map_mut(&file)? };
    Ok(mmap)
}

/// Map an existing region read/write.
pub fn attach_region_mmap(path: &Path) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShmError::NotFound {
                name: path.display().to_string(),
            },
            _ => ShmError::from(e),
        })?;

    // SAFETY: concurrent modification is confined to atomics and
    // sequence-counted cells of the payload type.
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Private anonymous mapping of `size` bytes (zero-filled).
pub fn anonymous_mmap(size: usize) -> ShmResult<MmapMut> {
    Ok(MmapMut::map_anon(size)?)
}

/// Pid of the calling process.
pub fn current_pid() -> u32 {
    getpid().as_raw() as u32
}

/// Returns true if a process with `pid` exists.
pub fn process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
