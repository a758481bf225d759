//! Program-break interface (§4.1).
//!
//! The only two operations the rest of the crate is allowed to use to grow
//! the arena: query the current break, and extend it by `N` bytes. Nothing
//! outside this module calls `sbrk` directly, matching §9's guidance to
//! confine raw-address-producing syscalls to one small trusted spot.

use libc::{c_void, intptr_t, sbrk};

use crate::error::HeapError;

/// Returns the current program break.
///
/// # Safety
///
/// Always safe to call; kept `unsafe` to match the rest of this module's
/// convention of marking every direct syscall wrapper explicitly.
pub(crate) unsafe fn current_break() -> *mut u8 {
  unsafe { sbrk(0) as *mut u8 }
}

/// Extends the program break by `bytes`, returning the break's value
/// *before* the extension (the start of the freshly mapped region).
///
/// # Safety
///
/// The caller must not have any live references into memory at or past the
/// old break when this fails and must serialize calls with every other
/// caller of this function (the heap's mutex does this).
pub(crate) unsafe fn extend_break(bytes: usize) -> Result<*mut u8, HeapError> {
  unsafe {
    let old_break = sbrk(bytes as intptr_t);
    if old_break == usize::MAX as *mut c_void {
      Err(HeapError::CapacityExceeded)
    } else {
      Ok(old_break as *mut u8)
    }
  }
}

/// Discovers the page size. Called once during lazy initialization.
pub(crate) fn page_size() -> usize {
  // SAFETY: sysconf with a well-known, always-valid name never fails in a
  // way that matters here; glibc returns -1 only for unknown names.
  let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
  debug_assert!(size > 0, "sysconf(_SC_PAGESIZE) returned a non-positive value");
  size as usize
}
